//! DXF图元到形状的转换

use super::aci_to_color;
use super::events::{
    is_block_layer, normalize_angle, DxfEventHandler, DxfEventReader, ReadStats, SplineData,
};
use super::parameters::DxfReaderOptions;
use crate::document::{Annotation, Document};
use crate::error::FileError;
use std::collections::BTreeMap;
use std::path::Path;
use zview_core::entity::Entity;
use zview_core::geometry::{Arc, BSplineCurve, Circle, Curve, Ellipse, GeometryError, Line, Shape};
use zview_core::layer::Layer;
use zview_core::math::{point_from_coords, points_coincide, Point3};
use zview_core::transform::Transform3D;

/// 事件处理器：缩放坐标、跳过退化图元、按图层累积形状
#[derive(Debug)]
pub struct DxfReader {
    options: DxfReaderOptions,
    current_layer: String,
    layers: BTreeMap<String, Vec<Shape>>,
    /// 图层表（颜色、开关状态）
    layer_table: Vec<Layer>,
    annotations: Vec<Annotation>,
    skipped: usize,
}

impl DxfReader {
    pub fn new(options: DxfReaderOptions) -> Self {
        Self {
            options,
            current_layer: "0".to_string(),
            layers: BTreeMap::new(),
            layer_table: Vec::new(),
            annotations: Vec::new(),
            skipped: 0,
        }
    }

    pub fn options(&self) -> &DxfReaderOptions {
        &self.options
    }

    /// 读取DXF文件
    pub fn read_file(&mut self, path: &Path) -> Result<ReadStats, FileError> {
        let drawing = dxf::Drawing::load_file(path).map_err(|e| FileError::Dxf(e.to_string()))?;
        tracing::info!("Reading DXF file {}", path.display());
        Ok(self.read_drawing(&drawing))
    }

    /// 读取已加载的图纸：先收集图层表，再遍历图元
    pub fn read_drawing(&mut self, drawing: &dxf::Drawing) -> ReadStats {
        for layer in drawing.layers() {
            let color = aci_to_color(layer.color.index().unwrap_or(7) as u8);
            self.layer_table
                .push(Layer::new(&layer.name).with_color(color).with_visible(layer.is_layer_on));
        }
        DxfEventReader::new(drawing).read(self)
    }

    /// 生成文档
    ///
    /// 块定义图层不进入文档；`group_layers` 打开时每个图层合并为一个组合形状。
    pub fn transfer(&self) -> Document {
        let mut document = Document::new();

        for layer in &self.layer_table {
            let target = document.layers.ensure_layer(&layer.name);
            target.color = layer.color;
            target.visible = layer.visible;
        }

        for (name, shapes) in &self.layers {
            if is_block_layer(name) {
                continue;
            }
            document.layers.ensure_layer(name);
            if self.options.group_layers {
                if !shapes.is_empty() {
                    document.add_entity(Entity::new(Shape::compound(shapes.clone())).with_layer(name));
                }
            } else {
                for shape in shapes {
                    document.add_entity(Entity::new(shape.clone()).with_layer(name));
                }
            }
        }

        for annotation in &self.annotations {
            document.layers.ensure_layer(annotation.layer());
            document.add_annotation(annotation.clone());
        }

        tracing::info!(
            "Transferred {} entities on {} layers ({} annotations, {} primitives skipped)",
            document.entity_count(),
            document.layers.count(),
            document.annotations().len(),
            self.skipped
        );
        document
    }

    /// 按图层名累积的形状（包括块定义图层）
    pub fn layers(&self) -> &BTreeMap<String, Vec<Shape>> {
        &self.layers
    }

    pub fn layer_shapes(&self, layer: &str) -> &[Shape] {
        self.layers.get(layer).map_or(&[], Vec::as_slice)
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// 被跳过的图元数（退化或构造失败）
    pub fn skipped_count(&self) -> usize {
        self.skipped
    }

    fn to_point(&self, coords: &[f64; 3]) -> Point3 {
        let p = point_from_coords(coords);
        if self.options.scaling != 1.0 {
            Point3::from(p.coords * self.options.scaling)
        } else {
            p
        }
    }

    fn add_shape(&mut self, shape: Shape) {
        self.layers
            .entry(self.current_layer.clone())
            .or_default()
            .push(shape);
    }

    fn add_curve(&mut self, curve: Result<Curve, GeometryError>, what: &str) {
        match curve {
            Ok(curve) => self.add_shape(Shape::Edge(curve)),
            Err(err) => self.skip(what, &err.to_string()),
        }
    }

    fn skip(&mut self, what: &str, reason: &str) {
        tracing::warn!(
            "Ignoring {} on layer '{}': {}",
            what,
            self.current_layer,
            reason
        );
        self.skipped += 1;
    }

    fn build_spline(&self, spline: &SplineData) -> Result<BSplineCurve, GeometryError> {
        if !spline.control_points.is_empty() {
            let poles: Vec<Point3> = spline.control_points.iter().map(|c| self.to_point(c)).collect();
            let weights = if spline.weights.len() == poles.len()
                && spline.weights.iter().any(|w| *w != 1.0)
            {
                spline.weights.clone()
            } else {
                Vec::new()
            };
            BSplineCurve::new(
                spline.degree,
                poles,
                spline.knots.clone(),
                weights,
                spline.is_periodic(),
            )
        } else if !spline.fit_points.is_empty() {
            let points: Vec<Point3> = spline.fit_points.iter().map(|c| self.to_point(c)).collect();
            BSplineCurve::interpolate(&points)
        } else {
            Err(GeometryError::InvalidSpline("no control or fit points".into()))
        }
    }

    fn in_block_definition(&self) -> bool {
        is_block_layer(&self.current_layer)
    }
}

impl DxfEventHandler for DxfReader {
    fn set_layer(&mut self, name: &str) {
        if self.current_layer != name {
            self.current_layer = name.to_string();
        }
    }

    fn on_line(&mut self, start: &[f64; 3], end: &[f64; 3], _hidden: bool) {
        let p0 = self.to_point(start);
        let p1 = self.to_point(end);
        if points_coincide(&p0, &p1) {
            self.skip("degenerate line", "coincident end points");
            return;
        }
        self.add_curve(Line::new(p0, p1).map(Curve::Line), "line");
    }

    fn on_point(&mut self, point: &[f64; 3]) {
        let p = self.to_point(point);
        self.add_shape(Shape::Vertex(p));
    }

    fn on_text(&mut self, point: &[f64; 3], height: f64, text: &str) {
        if !self.options.import_annotations || self.in_block_definition() {
            return;
        }
        let position = self.to_point(point);
        self.annotations.push(Annotation::Text {
            layer: self.current_layer.clone(),
            position,
            height: height * self.options.scaling,
            text: text.to_string(),
        });
    }

    fn on_arc(&mut self, start: &[f64; 3], end: &[f64; 3], center: &[f64; 3], ccw: bool, _hidden: bool) {
        let p0 = self.to_point(start);
        let p1 = self.to_point(end);
        let pc = self.to_point(center);
        let radius = nalgebra::distance(&p0, &pc);
        let angle_of = |p: &Point3| normalize_angle((p.y - pc.y).atan2(p.x - pc.x));
        // 顺时针圆弧等价于从终点到起点的逆时针圆弧
        let (from, to) = if ccw { (&p0, &p1) } else { (&p1, &p0) };
        let arc = Arc::new(pc, radius, angle_of(from), angle_of(to));
        self.add_curve(arc.map(Curve::Arc), "arc");
    }

    fn on_circle(&mut self, start: &[f64; 3], center: &[f64; 3], _ccw: bool, _hidden: bool) {
        let p0 = self.to_point(start);
        let pc = self.to_point(center);
        let radius = nalgebra::distance(&p0, &pc);
        self.add_curve(Circle::new(pc, radius).map(Curve::Circle), "circle");
    }

    fn on_ellipse(
        &mut self,
        center: &[f64; 3],
        major_radius: f64,
        minor_radius: f64,
        rotation: f64,
        start_angle: f64,
        end_angle: f64,
        _ccw: bool,
    ) {
        let pc = self.to_point(center);
        let ellipse = Ellipse::arc(
            pc,
            major_radius * self.options.scaling,
            minor_radius * self.options.scaling,
            rotation,
            start_angle,
            end_angle,
        );
        self.add_curve(ellipse.map(Curve::Ellipse), "ellipse");
    }

    fn on_spline(&mut self, spline: &SplineData) {
        let curve = self.build_spline(spline).map(Curve::BSpline);
        self.add_curve(curve, "spline");
    }

    fn on_insert(&mut self, point: &[f64; 3], scale: &[f64; 3], name: &str, rotation: f64) {
        let prefix = format!("BLOCKS {} ", name);
        let p = self.to_point(point);
        let location = Transform3D::translation(p.x, p.y, p.z)
            .then(&Transform3D::rotation_z(rotation))
            .then(&Transform3D::scale(scale[0], scale[1], scale[2]));

        let compounds: Vec<Shape> = self
            .layers
            .iter()
            .filter(|(layer, shapes)| layer.starts_with(&prefix) && !shapes.is_empty())
            .map(|(_, shapes)| Shape::located(shapes.clone(), location))
            .collect();

        if compounds.is_empty() {
            tracing::debug!("Insert of unknown or empty block '{}'", name);
        }
        for compound in compounds {
            self.add_shape(compound);
        }
    }

    fn on_dimension(&mut self, start: &[f64; 3], end: &[f64; 3], point: &[f64; 3], rotation: f64) {
        if !self.options.import_annotations || self.in_block_definition() {
            return;
        }
        let annotation = Annotation::Dimension {
            layer: self.current_layer.clone(),
            start: self.to_point(start),
            end: self.to_point(end),
            position: self.to_point(point),
            rotation,
        };
        self.annotations.push(annotation);
    }

    fn on_degenerate(&mut self, what: &str, reason: &str) {
        self.skip(what, reason);
    }
}
