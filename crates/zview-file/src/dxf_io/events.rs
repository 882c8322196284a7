//! DXF事件协议
//!
//! [`DxfEventReader`] 遍历 `dxf::Drawing`，对每个识别出的图元回调
//! [`DxfEventHandler`]，坐标以原始 `[f64; 3]` 传递，角度为弧度。
//! 多段线在这里拆成直线段和圆弧段。

use dxf::entities::{Entity, EntityType};
use std::f64::consts::TAU;

/// 块定义中的图元使用的图层名前缀
pub const BLOCK_LAYER_PREFIX: &str = "BLOCKS";

/// 块定义图元所在的图层名：`BLOCKS <块名> <图层名>`
pub fn block_layer_name(block: &str, layer: &str) -> String {
    format!("{} {} {}", BLOCK_LAYER_PREFIX, block, layer)
}

/// 是否为块定义图层
pub fn is_block_layer(name: &str) -> bool {
    name.starts_with(BLOCK_LAYER_PREFIX)
}

/// 样条数据
///
/// 标志位：1 闭合，2 周期，4 有理，8 平面，16 线性
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplineData {
    pub degree: usize,
    pub flags: i32,
    pub knots: Vec<f64>,
    pub weights: Vec<f64>,
    pub control_points: Vec<[f64; 3]>,
    pub fit_points: Vec<[f64; 3]>,
}

impl SplineData {
    pub fn is_closed(&self) -> bool {
        self.flags & 1 != 0
    }

    pub fn is_periodic(&self) -> bool {
        self.flags & 2 != 0
    }
}

/// 图元回调
///
/// `ccw` 为圆和圆弧的绕向（法向朝 +Z 时为 true）。
pub trait DxfEventHandler {
    /// 之后的图元属于该图层
    fn set_layer(&mut self, name: &str);

    fn on_line(&mut self, start: &[f64; 3], end: &[f64; 3], hidden: bool);

    fn on_point(&mut self, point: &[f64; 3]);

    fn on_text(&mut self, point: &[f64; 3], height: f64, text: &str);

    fn on_arc(&mut self, start: &[f64; 3], end: &[f64; 3], center: &[f64; 3], ccw: bool, hidden: bool);

    fn on_circle(&mut self, start: &[f64; 3], center: &[f64; 3], ccw: bool, hidden: bool);

    #[allow(clippy::too_many_arguments)]
    fn on_ellipse(
        &mut self,
        center: &[f64; 3],
        major_radius: f64,
        minor_radius: f64,
        rotation: f64,
        start_angle: f64,
        end_angle: f64,
        ccw: bool,
    );

    fn on_spline(&mut self, spline: &SplineData);

    /// 块插入，`scale` 为三个轴向的缩放系数
    fn on_insert(&mut self, point: &[f64; 3], scale: &[f64; 3], name: &str, rotation: f64);

    fn on_dimension(&mut self, start: &[f64; 3], end: &[f64; 3], point: &[f64; 3], rotation: f64);

    /// 退化图元（如半径非正的圆）在分发前被丢弃
    fn on_degenerate(&mut self, _what: &str, _reason: &str) {}
}

/// 遍历统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadStats {
    /// 分发给处理器的图元数
    pub dispatched: usize,
    /// 不支持的图元数
    pub unsupported: usize,
    /// 退化而未分发的图元数
    pub degenerate: usize,
}

/// DXF事件读取器
pub struct DxfEventReader<'a> {
    drawing: &'a dxf::Drawing,
}

impl<'a> DxfEventReader<'a> {
    pub fn new(drawing: &'a dxf::Drawing) -> Self {
        Self { drawing }
    }

    /// 先遍历块定义，再遍历模型空间
    ///
    /// 块插入要求对应块的形状已经累积，因此块定义必须先读。
    pub fn read(&self, handler: &mut dyn DxfEventHandler) -> ReadStats {
        let mut stats = ReadStats::default();

        for block in self.drawing.blocks() {
            for entity in &block.entities {
                handler.set_layer(&block_layer_name(&block.name, &entity.common.layer));
                dispatch(entity, handler, &mut stats);
            }
        }

        for entity in self.drawing.entities() {
            handler.set_layer(&entity.common.layer);
            dispatch(entity, handler, &mut stats);
        }

        tracing::debug!(
            "DXF walk finished: {} primitives dispatched, {} unsupported, {} degenerate",
            stats.dispatched,
            stats.unsupported,
            stats.degenerate
        );
        stats
    }
}

fn coords(p: &dxf::Point) -> [f64; 3] {
    [p.x, p.y, p.z]
}

fn polar(center: &dxf::Point, radius: f64, angle: f64) -> [f64; 3] {
    [
        center.x + radius * angle.cos(),
        center.y + radius * angle.sin(),
        center.z,
    ]
}

fn dispatch(entity: &Entity, handler: &mut dyn DxfEventHandler, stats: &mut ReadStats) {
    let hidden = !entity.common.is_visible;
    match &entity.specific {
        EntityType::Line(line) => {
            handler.on_line(&coords(&line.p1), &coords(&line.p2), hidden);
        }

        EntityType::ModelPoint(point) => {
            handler.on_point(&coords(&point.location));
        }

        EntityType::Circle(circle) => {
            if !(circle.radius > 0.0) {
                degenerate(handler, stats, "circle", circle.radius);
                return;
            }
            let start = polar(&circle.center, circle.radius, 0.0);
            handler.on_circle(&start, &coords(&circle.center), circle.normal.z >= 0.0, hidden);
        }

        EntityType::Arc(arc) => {
            if !(arc.radius > 0.0) {
                degenerate(handler, stats, "arc", arc.radius);
                return;
            }
            let start = polar(&arc.center, arc.radius, arc.start_angle.to_radians());
            let end = polar(&arc.center, arc.radius, arc.end_angle.to_radians());
            handler.on_arc(&start, &end, &coords(&arc.center), arc.normal.z >= 0.0, hidden);
        }

        EntityType::Ellipse(ellipse) => {
            let axis = &ellipse.major_axis;
            let major_radius = (axis.x * axis.x + axis.y * axis.y + axis.z * axis.z).sqrt();
            handler.on_ellipse(
                &coords(&ellipse.center),
                major_radius,
                major_radius * ellipse.minor_axis_ratio,
                axis.y.atan2(axis.x),
                ellipse.start_parameter,
                ellipse.end_parameter,
                ellipse.normal.z >= 0.0,
            );
        }

        EntityType::LwPolyline(poly) => {
            let vertices: Vec<([f64; 3], f64)> = poly
                .vertices
                .iter()
                .map(|v| ([v.x, v.y, entity.common.elevation], v.bulge))
                .collect();
            polyline_segments(&vertices, poly.is_closed(), hidden, handler);
        }

        EntityType::Polyline(poly) => {
            let vertices: Vec<([f64; 3], f64)> = poly
                .vertices()
                .map(|v| (coords(&v.location), v.bulge))
                .collect();
            polyline_segments(&vertices, poly.is_closed(), hidden, handler);
        }

        EntityType::Spline(spline) => {
            let data = SplineData {
                degree: spline.degree_of_curve.max(0) as usize,
                flags: spline.flags as i32,
                knots: spline.knot_values.clone(),
                weights: spline.weight_values.clone(),
                control_points: spline.control_points.iter().map(coords).collect(),
                fit_points: spline.fit_points.iter().map(coords).collect(),
            };
            handler.on_spline(&data);
        }

        EntityType::Text(text) => {
            handler.on_text(&coords(&text.location), text.text_height, &text.value);
        }

        EntityType::MText(mtext) => {
            // 段落分隔符换成换行，其余格式代码原样保留
            let content = mtext.text.replace("\\P", "\n");
            handler.on_text(
                &coords(&mtext.insertion_point),
                mtext.initial_text_height,
                &content,
            );
        }

        EntityType::Insert(insert) => {
            let scale = [
                insert.x_scale_factor,
                insert.y_scale_factor,
                insert.z_scale_factor,
            ];
            handler.on_insert(
                &coords(&insert.location),
                &scale,
                &insert.name,
                insert.rotation.to_radians(),
            );
        }

        EntityType::RotatedDimension(dim) => {
            handler.on_dimension(
                &coords(&dim.definition_point_2),
                &coords(&dim.definition_point_3),
                &coords(&dim.dimension_base.text_mid_point),
                dim.rotation_angle.to_radians(),
            );
        }

        _ => {
            tracing::debug!("Unsupported DXF entity skipped on layer '{}'", entity.common.layer);
            stats.unsupported += 1;
            return;
        }
    }
    stats.dispatched += 1;
}

fn degenerate(handler: &mut dyn DxfEventHandler, stats: &mut ReadStats, what: &str, radius: f64) {
    handler.on_degenerate(what, &format!("non-positive radius {}", radius));
    stats.degenerate += 1;
}

/// 多段线拆分：凸度为0的段为直线，否则为圆弧（凸度 = tan(圆心角/4)）
fn polyline_segments(
    vertices: &[([f64; 3], f64)],
    closed: bool,
    hidden: bool,
    handler: &mut dyn DxfEventHandler,
) {
    let count = vertices.len();
    if count < 2 {
        return;
    }
    let segments = if closed { count } else { count - 1 };
    for i in 0..segments {
        let (start, bulge) = vertices[i];
        let (end, _) = vertices[(i + 1) % count];
        if bulge.abs() < 1e-12 {
            handler.on_line(&start, &end, hidden);
        } else {
            let center = bulge_center(&start, &end, bulge);
            handler.on_arc(&start, &end, &center, bulge > 0.0, hidden);
        }
    }
}

/// 凸度圆弧的圆心，位于弦的左侧（凸度为正时）
fn bulge_center(start: &[f64; 3], end: &[f64; 3], bulge: f64) -> [f64; 3] {
    let dx = end[0] - start[0];
    let dy = end[1] - start[1];
    let chord = (dx * dx + dy * dy).sqrt();
    if chord == 0.0 {
        return *start;
    }
    let offset = chord * (1.0 / bulge - bulge) / 4.0;
    let (nx, ny) = (-dy / chord, dx / chord);
    [
        (start[0] + end[0]) / 2.0 + nx * offset,
        (start[1] + end[1]) / 2.0 + ny * offset,
        start[2],
    ]
}

/// 把角度规范到 [0, 2π)
pub(crate) fn normalize_angle(angle: f64) -> f64 {
    angle.rem_euclid(TAU)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        layers: Vec<String>,
        lines: usize,
        arcs: Vec<([f64; 3], bool)>,
        inserts: Vec<String>,
        degenerate: Vec<String>,
    }

    impl DxfEventHandler for Recorder {
        fn set_layer(&mut self, name: &str) {
            self.layers.push(name.to_string());
        }
        fn on_line(&mut self, _: &[f64; 3], _: &[f64; 3], _: bool) {
            self.lines += 1;
        }
        fn on_point(&mut self, _: &[f64; 3]) {}
        fn on_text(&mut self, _: &[f64; 3], _: f64, _: &str) {}
        fn on_arc(&mut self, _: &[f64; 3], _: &[f64; 3], center: &[f64; 3], ccw: bool, _: bool) {
            self.arcs.push((*center, ccw));
        }
        fn on_circle(&mut self, _: &[f64; 3], _: &[f64; 3], _: bool, _: bool) {}
        fn on_ellipse(&mut self, _: &[f64; 3], _: f64, _: f64, _: f64, _: f64, _: f64, _: bool) {}
        fn on_spline(&mut self, _: &SplineData) {}
        fn on_insert(&mut self, _: &[f64; 3], _: &[f64; 3], name: &str, _: f64) {
            self.inserts.push(name.to_string());
        }
        fn on_dimension(&mut self, _: &[f64; 3], _: &[f64; 3], _: &[f64; 3], _: f64) {}
        fn on_degenerate(&mut self, what: &str, _: &str) {
            self.degenerate.push(what.to_string());
        }
    }

    #[test]
    fn test_block_layer_names() {
        let name = block_layer_name("DOOR", "0");
        assert_eq!(name, "BLOCKS DOOR 0");
        assert!(is_block_layer(&name));
        assert!(!is_block_layer("WALLS"));
    }

    #[test]
    fn test_bulge_semicircle_center() {
        let center = bulge_center(&[1.0, 0.0, 0.0], &[-1.0, 0.0, 0.0], 1.0);
        assert!(center[0].abs() < 1e-12);
        assert!(center[1].abs() < 1e-12);
    }

    #[test]
    fn test_polyline_split_into_segments() {
        let mut recorder = Recorder::default();
        let vertices = [
            ([0.0, 0.0, 0.0], 0.0),
            ([1.0, 0.0, 0.0], 1.0),
            ([1.0, 1.0, 0.0], 0.0),
        ];
        polyline_segments(&vertices, true, false, &mut recorder);
        assert_eq!(recorder.lines, 2);
        assert_eq!(recorder.arcs.len(), 1);
        let (center, ccw) = recorder.arcs[0];
        assert!(ccw);
        assert!((center[0] - 1.0).abs() < 1e-12);
        assert!((center[1] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_reader_walks_blocks_first() {
        let mut drawing = dxf::Drawing::new();

        let mut block = dxf::Block::default();
        block.name = "B".to_string();
        let mut line = dxf::entities::Line::default();
        line.p2 = dxf::Point::new(1.0, 0.0, 0.0);
        let mut block_entity = dxf::entities::Entity::new(EntityType::Line(line));
        block_entity.common.layer = "0".to_string();
        block.entities.push(block_entity);
        drawing.add_block(block);

        let mut insert = dxf::entities::Insert::default();
        insert.name = "B".to_string();
        let mut entity = dxf::entities::Entity::new(EntityType::Insert(insert));
        entity.common.layer = "DOORS".to_string();
        drawing.add_entity(entity);

        let mut recorder = Recorder::default();
        let stats = DxfEventReader::new(&drawing).read(&mut recorder);

        assert_eq!(stats.dispatched, 2);
        assert_eq!(recorder.lines, 1);
        assert_eq!(recorder.inserts, vec!["B".to_string()]);
        let block_pos = recorder.layers.iter().position(|l| l == "BLOCKS B 0").unwrap();
        let model_pos = recorder.layers.iter().position(|l| l == "DOORS").unwrap();
        assert!(block_pos < model_pos);
    }

    #[test]
    fn test_reader_splits_lwpolyline_with_bulge() {
        let mut poly = dxf::entities::LwPolyline::default();
        for (x, y, bulge) in [(0.0, 0.0, 0.0), (1.0, 0.0, 1.0), (1.0, 1.0, 0.0)] {
            let mut vertex = dxf::LwPolylineVertex::default();
            vertex.x = x;
            vertex.y = y;
            vertex.bulge = bulge;
            poly.vertices.push(vertex);
        }
        let mut entity = dxf::entities::Entity::new(EntityType::LwPolyline(poly));
        entity.common.layer = "OUTLINE".to_string();
        entity.common.elevation = 3.0;
        let mut drawing = dxf::Drawing::new();
        drawing.add_entity(entity);

        let mut recorder = Recorder::default();
        let stats = DxfEventReader::new(&drawing).read(&mut recorder);

        assert_eq!(stats.dispatched, 1);
        assert_eq!(recorder.lines, 1);
        assert_eq!(recorder.arcs.len(), 1);
        let (center, ccw) = recorder.arcs[0];
        assert!(ccw);
        assert!((center[0] - 1.0).abs() < 1e-12);
        assert!((center[1] - 0.5).abs() < 1e-12);
        assert_eq!(center[2], 3.0);
    }

    #[test]
    fn test_non_positive_radius_is_not_dispatched() {
        let mut drawing = dxf::Drawing::new();
        let mut circle = dxf::entities::Circle::default();
        circle.radius = -5.0;
        drawing.add_entity(dxf::entities::Entity::new(EntityType::Circle(circle)));
        let mut arc = dxf::entities::Arc::default();
        arc.radius = 0.0;
        arc.end_angle = 90.0;
        drawing.add_entity(dxf::entities::Entity::new(EntityType::Arc(arc)));

        let mut recorder = Recorder::default();
        let stats = DxfEventReader::new(&drawing).read(&mut recorder);

        assert_eq!(stats.dispatched, 0);
        assert_eq!(stats.degenerate, 2);
        assert!(recorder.arcs.is_empty());
        assert_eq!(recorder.degenerate, vec!["circle".to_string(), "arc".to_string()]);
    }
}
