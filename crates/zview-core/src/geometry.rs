//! 形状与曲线
//!
//! 导入只需要的几何：
//! - 形状: 顶点 (Vertex)、边 (Edge)、组合 (Compound，带放置变换)
//! - 曲线: 线段、圆、圆弧、椭圆（弧）、B样条/NURBS
//!
//! 圆、圆弧和椭圆位于平行于XY平面的平面内，角度为绕Z轴的弧度。

use crate::math::{points_coincide, BoundingBox3, Point3, Vector3, EPSILON};
use crate::transform::Transform3D;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// 几何构造错误
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("Radius must be positive, got {0}")]
    NonPositiveRadius(f64),

    #[error("End points coincide")]
    CoincidentPoints,

    #[error("Invalid spline: {0}")]
    InvalidSpline(String),

    #[error("Spline interpolation failed: {0}")]
    InterpolationFailed(String),
}

/// 线段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub start: Point3,
    pub end: Point3,
}

impl Line {
    /// 端点重合时失败
    pub fn new(start: Point3, end: Point3) -> Result<Self, GeometryError> {
        if points_coincide(&start, &end) {
            return Err(GeometryError::CoincidentPoints);
        }
        Ok(Self { start, end })
    }

    pub fn length(&self) -> f64 {
        (self.end - self.start).norm()
    }

    pub fn point_at(&self, t: f64) -> Point3 {
        self.start + (self.end - self.start) * t
    }
}

/// 圆
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub center: Point3,
    pub radius: f64,
}

impl Circle {
    pub fn new(center: Point3, radius: f64) -> Result<Self, GeometryError> {
        if !(radius > 0.0) {
            return Err(GeometryError::NonPositiveRadius(radius));
        }
        Ok(Self { center, radius })
    }

    pub fn point_at_angle(&self, angle: f64) -> Point3 {
        Point3::new(
            self.center.x + self.radius * angle.cos(),
            self.center.y + self.radius * angle.sin(),
            self.center.z,
        )
    }
}

/// 圆弧（逆时针，从起始角到终止角）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arc {
    pub center: Point3,
    pub radius: f64,
    pub start_angle: f64,
    pub end_angle: f64,
}

impl Arc {
    pub fn new(
        center: Point3,
        radius: f64,
        start_angle: f64,
        end_angle: f64,
    ) -> Result<Self, GeometryError> {
        if !(radius > 0.0) {
            return Err(GeometryError::NonPositiveRadius(radius));
        }
        Ok(Self {
            center,
            radius,
            start_angle,
            end_angle,
        })
    }

    /// 扫掠角，范围 (0, 2π]
    pub fn sweep_angle(&self) -> f64 {
        let sweep = (self.end_angle - self.start_angle).rem_euclid(TAU);
        if sweep < EPSILON {
            TAU
        } else {
            sweep
        }
    }

    pub fn point_at_angle(&self, angle: f64) -> Point3 {
        Point3::new(
            self.center.x + self.radius * angle.cos(),
            self.center.y + self.radius * angle.sin(),
            self.center.z,
        )
    }

    pub fn start_point(&self) -> Point3 {
        self.point_at_angle(self.start_angle)
    }

    pub fn end_point(&self) -> Point3 {
        self.point_at_angle(self.start_angle + self.sweep_angle())
    }
}

/// 椭圆或椭圆弧
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ellipse {
    pub center: Point3,
    pub major_radius: f64,
    pub minor_radius: f64,
    /// 长轴相对X轴的旋转角
    pub rotation: f64,
    pub start_param: f64,
    pub end_param: f64,
}

impl Ellipse {
    /// 创建完整椭圆
    pub fn new(
        center: Point3,
        major_radius: f64,
        minor_radius: f64,
        rotation: f64,
    ) -> Result<Self, GeometryError> {
        Self::arc(center, major_radius, minor_radius, rotation, 0.0, TAU)
    }

    /// 创建椭圆弧
    pub fn arc(
        center: Point3,
        major_radius: f64,
        minor_radius: f64,
        rotation: f64,
        start_param: f64,
        end_param: f64,
    ) -> Result<Self, GeometryError> {
        if !(major_radius > 0.0) {
            return Err(GeometryError::NonPositiveRadius(major_radius));
        }
        if !(minor_radius > 0.0) {
            return Err(GeometryError::NonPositiveRadius(minor_radius));
        }
        Ok(Self {
            center,
            major_radius,
            minor_radius,
            rotation,
            start_param,
            end_param,
        })
    }

    pub fn is_full(&self) -> bool {
        (self.end_param - self.start_param - TAU).abs() < EPSILON
    }

    /// 参数 t 是椭圆的参数化角度，不是几何角度
    pub fn point_at_param(&self, t: f64) -> Point3 {
        let (sin_r, cos_r) = self.rotation.sin_cos();
        let x = self.major_radius * t.cos();
        let y = self.minor_radius * t.sin();
        Point3::new(
            self.center.x + x * cos_r - y * sin_r,
            self.center.y + x * sin_r + y * cos_r,
            self.center.z,
        )
    }
}

/// B样条曲线（权重非空时为NURBS）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BSplineCurve {
    degree: usize,
    poles: Vec<Point3>,
    /// 展开的节点向量（重复节点按重数重复）
    knots: Vec<f64>,
    weights: Vec<f64>,
    periodic: bool,
}

impl BSplineCurve {
    /// 由控制点、展开的节点向量和可选权重构造
    pub fn new(
        degree: usize,
        poles: Vec<Point3>,
        knots: Vec<f64>,
        weights: Vec<f64>,
        periodic: bool,
    ) -> Result<Self, GeometryError> {
        if degree == 0 {
            return Err(GeometryError::InvalidSpline("degree must be at least 1".into()));
        }
        if poles.len() <= degree {
            return Err(GeometryError::InvalidSpline(format!(
                "{} poles are not enough for degree {}",
                poles.len(),
                degree
            )));
        }
        if knots.len() != poles.len() + degree + 1 {
            return Err(GeometryError::InvalidSpline(format!(
                "expected {} knots, got {}",
                poles.len() + degree + 1,
                knots.len()
            )));
        }
        if knots.windows(2).any(|w| !(w[0] <= w[1])) {
            return Err(GeometryError::InvalidSpline("knots are not non-decreasing".into()));
        }
        if !(knots[degree] < knots[poles.len()]) {
            return Err(GeometryError::InvalidSpline("empty parameter range".into()));
        }
        if !weights.is_empty() {
            if weights.len() != poles.len() {
                return Err(GeometryError::InvalidSpline(format!(
                    "expected {} weights, got {}",
                    poles.len(),
                    weights.len()
                )));
            }
            if weights.iter().any(|w| !(*w > 0.0)) {
                return Err(GeometryError::InvalidSpline("weights must be positive".into()));
            }
        }
        Ok(Self {
            degree,
            poles,
            knots,
            weights,
            periodic,
        })
    }

    /// 由去重节点和重数构造
    pub fn from_knots_and_multiplicities(
        degree: usize,
        poles: Vec<Point3>,
        knots: &[f64],
        multiplicities: &[usize],
        weights: Vec<f64>,
    ) -> Result<Self, GeometryError> {
        if knots.len() != multiplicities.len() {
            return Err(GeometryError::InvalidSpline(
                "knots and multiplicities differ in length".into(),
            ));
        }
        let flat = knots
            .iter()
            .zip(multiplicities)
            .flat_map(|(k, m)| std::iter::repeat(*k).take(*m))
            .collect();
        Self::new(degree, poles, flat, weights, false)
    }

    /// 通过型值点插值（弦长参数化，端点夹紧），次数不超过3
    pub fn interpolate(points: &[Point3]) -> Result<Self, GeometryError> {
        if points.len() < 2 {
            return Err(GeometryError::InterpolationFailed(format!(
                "need at least 2 points, got {}",
                points.len()
            )));
        }
        if points.windows(2).any(|w| points_coincide(&w[0], &w[1])) {
            return Err(GeometryError::InterpolationFailed(
                "consecutive points coincide".into(),
            ));
        }

        let n = points.len() - 1;
        let degree = n.min(3);

        // 弦长参数
        let chords: Vec<f64> = points.windows(2).map(|w| (w[1] - w[0]).norm()).collect();
        let total: f64 = chords.iter().sum();
        let mut params = Vec::with_capacity(points.len());
        params.push(0.0);
        let mut acc = 0.0;
        for chord in &chords[..n - 1] {
            acc += chord / total;
            params.push(acc);
        }
        params.push(1.0);

        // 平均法节点向量
        let mut knots = vec![0.0; degree + 1];
        for j in 1..=(n - degree) {
            let sum: f64 = params[j..j + degree].iter().sum();
            knots.push(sum / degree as f64);
        }
        knots.extend(std::iter::repeat(1.0).take(degree + 1));

        let size = n + 1;
        let mut matrix = DMatrix::<f64>::zeros(size, size);
        for (row, &u) in params.iter().enumerate() {
            let span = find_span(n, degree, u, &knots);
            let basis = basis_functions(span, u, degree, &knots);
            for (offset, value) in basis.iter().enumerate() {
                matrix[(row, span - degree + offset)] = *value;
            }
        }
        let rhs = DMatrix::from_fn(size, 3, |row, col| points[row][col]);
        let solution = matrix
            .lu()
            .solve(&rhs)
            .ok_or_else(|| GeometryError::InterpolationFailed("singular system".into()))?;

        let poles = (0..size)
            .map(|row| Point3::new(solution[(row, 0)], solution[(row, 1)], solution[(row, 2)]))
            .collect();
        Self::new(degree, poles, knots, Vec::new(), false)
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn poles(&self) -> &[Point3] {
        &self.poles
    }

    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn is_rational(&self) -> bool {
        !self.weights.is_empty()
    }

    pub fn is_periodic(&self) -> bool {
        self.periodic
    }

    /// 去重节点及其重数
    pub fn knots_and_multiplicities(&self) -> (Vec<f64>, Vec<usize>) {
        let mut knots: Vec<f64> = Vec::new();
        let mut multiplicities: Vec<usize> = Vec::new();
        for &k in &self.knots {
            match knots.last() {
                Some(&last) if (k - last).abs() < EPSILON => {
                    if let Some(m) = multiplicities.last_mut() {
                        *m += 1;
                    }
                }
                _ => {
                    knots.push(k);
                    multiplicities.push(1);
                }
            }
        }
        (knots, multiplicities)
    }

    pub fn param_range(&self) -> (f64, f64) {
        (self.knots[self.degree], self.knots[self.poles.len()])
    }

    /// 曲线上的点，参数被限制在有效范围内
    pub fn point_at(&self, u: f64) -> Point3 {
        let (first, last) = self.param_range();
        let u = u.clamp(first, last);
        let n = self.poles.len() - 1;
        let span = find_span(n, self.degree, u, &self.knots);
        let basis = basis_functions(span, u, self.degree, &self.knots);

        let mut sum = Vector3::zeros();
        let mut weight_sum = 0.0;
        for (offset, value) in basis.iter().enumerate() {
            let index = span - self.degree + offset;
            let weight = self.weights.get(index).copied().unwrap_or(1.0);
            sum += self.poles[index].coords * (value * weight);
            weight_sum += value * weight;
        }
        Point3::from(sum / weight_sum)
    }

    pub fn start_point(&self) -> Point3 {
        self.point_at(self.param_range().0)
    }

    pub fn end_point(&self) -> Point3 {
        self.point_at(self.param_range().1)
    }
}

/// 查找参数所在的节点区间
fn find_span(n: usize, degree: usize, u: f64, knots: &[f64]) -> usize {
    if u >= knots[n + 1] {
        return n;
    }
    if u <= knots[degree] {
        return degree;
    }
    let (mut low, mut high) = (degree, n + 1);
    let mut mid = (low + high) / 2;
    while u < knots[mid] || u >= knots[mid + 1] {
        if u < knots[mid] {
            high = mid;
        } else {
            low = mid;
        }
        mid = (low + high) / 2;
    }
    mid
}

/// 区间内非零的 degree+1 个基函数值
fn basis_functions(span: usize, u: f64, degree: usize, knots: &[f64]) -> Vec<f64> {
    let mut values = vec![0.0; degree + 1];
    let mut left = vec![0.0; degree + 1];
    let mut right = vec![0.0; degree + 1];
    values[0] = 1.0;
    for j in 1..=degree {
        left[j] = u - knots[span + 1 - j];
        right[j] = knots[span + j] - u;
        let mut saved = 0.0;
        for r in 0..j {
            let denom = right[r + 1] + left[j - r];
            let temp = if denom.abs() < EPSILON { 0.0 } else { values[r] / denom };
            values[r] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        values[j] = saved;
    }
    values
}

/// 曲线
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Curve {
    Line(Line),
    Circle(Circle),
    Arc(Arc),
    Ellipse(Ellipse),
    BSpline(BSplineCurve),
}

impl Curve {
    pub fn type_name(&self) -> &'static str {
        match self {
            Curve::Line(_) => "Line",
            Curve::Circle(_) => "Circle",
            Curve::Arc(_) => "Arc",
            Curve::Ellipse(_) => "Ellipse",
            Curve::BSpline(_) => "BSpline",
        }
    }

    /// 沿曲线均匀采样（按参数）
    pub fn sample_points(&self, segments: usize) -> Vec<Point3> {
        let segments = segments.max(1);
        let at = |i: usize| i as f64 / segments as f64;
        match self {
            Curve::Line(l) => vec![l.start, l.end],
            Curve::Circle(c) => (0..=segments).map(|i| c.point_at_angle(TAU * at(i))).collect(),
            Curve::Arc(a) => (0..=segments)
                .map(|i| a.point_at_angle(a.start_angle + a.sweep_angle() * at(i)))
                .collect(),
            Curve::Ellipse(e) => (0..=segments)
                .map(|i| e.point_at_param(e.start_param + (e.end_param - e.start_param) * at(i)))
                .collect(),
            Curve::BSpline(s) => {
                let (first, last) = s.param_range();
                (0..=segments)
                    .map(|i| s.point_at(first + (last - first) * at(i)))
                    .collect()
            }
        }
    }
}

/// 形状
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Vertex(Point3),
    Edge(Curve),
    Compound {
        shapes: Vec<Shape>,
        location: Transform3D,
    },
}

impl Shape {
    pub fn compound(shapes: Vec<Shape>) -> Self {
        Shape::Compound {
            shapes,
            location: Transform3D::identity(),
        }
    }

    /// 放置在 `location` 处的组合
    pub fn located(shapes: Vec<Shape>, location: Transform3D) -> Self {
        Shape::Compound { shapes, location }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Shape::Vertex(_) => "Vertex",
            Shape::Edge(_) => "Edge",
            Shape::Compound { .. } => "Compound",
        }
    }

    pub fn as_curve(&self) -> Option<&Curve> {
        match self {
            Shape::Edge(curve) => Some(curve),
            _ => None,
        }
    }

    /// 递归统计边数
    pub fn edge_count(&self) -> usize {
        match self {
            Shape::Vertex(_) => 0,
            Shape::Edge(_) => 1,
            Shape::Compound { shapes, .. } => shapes.iter().map(Shape::edge_count).sum(),
        }
    }

    /// 递归统计孤立顶点数
    pub fn vertex_count(&self) -> usize {
        match self {
            Shape::Vertex(_) => 1,
            Shape::Edge(_) => 0,
            Shape::Compound { shapes, .. } => shapes.iter().map(Shape::vertex_count).sum(),
        }
    }

    /// 包围盒（曲线按采样点近似）
    pub fn bounding_box(&self) -> BoundingBox3 {
        let mut bbox = BoundingBox3::empty();
        self.collect_bounds(&Transform3D::identity(), &mut bbox);
        bbox
    }

    fn collect_bounds(&self, transform: &Transform3D, bbox: &mut BoundingBox3) {
        match self {
            Shape::Vertex(p) => bbox.expand_to_include(&transform.transform_point(p)),
            Shape::Edge(curve) => {
                for p in curve.sample_points(32) {
                    bbox.expand_to_include(&transform.transform_point(&p));
                }
            }
            Shape::Compound { shapes, location } => {
                let combined = transform.then(location);
                for shape in shapes {
                    shape.collect_bounds(&combined, bbox);
                }
            }
        }
    }
}
