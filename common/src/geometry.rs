use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// 尺寸
#[derive(JsonSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    #[schemars(title = "宽度")]
    pub width: i32,
    #[schemars(title = "高度")]
    pub height: i32,
}

impl Size {
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// 宽或高不大于 0
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }
}

/// 点坐标
#[derive(JsonSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    #[schemars(title = "X 坐标")]
    pub x: i32,
    #[schemars(title = "Y 坐标")]
    pub y: i32,
}

/// 浮点坐标
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct PointF {
    pub x: f32,
    pub y: f32,
}

impl PointF {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// 两点间距离
    pub fn distance(&self, other: &PointF) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// 矩形区域
///
/// 左上角为 `(left, top)`，右下角为 `(right, bottom)`，右下边界不包含在区域内
#[derive(JsonSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rectangle {
    #[schemars(title = "左边界")]
    pub left: i32,
    #[schemars(title = "上边界")]
    pub top: i32,
    #[schemars(title = "右边界")]
    pub right: i32,
    #[schemars(title = "下边界")]
    pub bottom: i32,
}

impl Rectangle {
    /// 创建矩形, 颠倒的边界会被交换
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left: left.min(right),
            top: top.min(bottom),
            right: left.max(right),
            bottom: top.max(bottom),
        }
    }

    /// 通过左上角坐标与宽高创建矩形
    pub fn from_xywh(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self::new(x, y, x.saturating_add(width), y.saturating_add(height))
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn area(&self) -> i64 {
        self.width() as i64 * self.height() as i64
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    pub fn center(&self) -> PointF {
        PointF::new(
            (self.left + self.right) as f32 / 2.0,
            (self.top + self.bottom) as f32 / 2.0,
        )
    }

    /// 平移矩形
    ///
    /// # 参数
    ///
    /// * `dx` - X 轴偏移量
    /// * `dy` - Y 轴偏移量
    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        Self {
            left: self.left + dx,
            top: self.top + dy,
            right: self.right + dx,
            bottom: self.bottom + dy,
        }
    }

    /// 两个矩形的交集, 无交集时返回 `None`
    pub fn intersection(&self, other: &Rectangle) -> Option<Rectangle> {
        let rect = Rectangle {
            left: self.left.max(other.left),
            top: self.top.max(other.top),
            right: self.right.min(other.right),
            bottom: self.bottom.min(other.bottom),
        };
        if rect.is_empty() { None } else { Some(rect) }
    }

    /// 将矩形裁剪到 `(0, 0)` 至 `size` 的范围内
    ///
    /// # 参数
    ///
    /// * `size` - 边界尺寸
    pub fn snap_to(&self, size: Size) -> Rectangle {
        let width = size.width.max(0);
        let height = size.height.max(0);
        Rectangle::new(
            self.left.clamp(0, width),
            self.top.clamp(0, height),
            self.right.clamp(0, width),
            self.bottom.clamp(0, height),
        )
    }

    /// 交并比
    pub fn iou(&self, other: &Rectangle) -> f32 {
        let inter = self.intersection(other).map(|r| r.area()).unwrap_or(0);
        let union = self.area() + other.area() - inter;
        if union <= 0 {
            return 0.0;
        }
        inter as f32 / union as f32
    }
}

/// 旋转矩形
///
/// `angle` 为角度制, 在 Y 轴向下的图像坐标系中顺时针为正
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct RotatedRect {
    pub center: PointF,
    pub width: f32,
    pub height: f32,
    pub angle: f32,
}

impl RotatedRect {
    pub fn new(center: PointF, width: f32, height: f32, angle: f32) -> Self {
        Self {
            center,
            width,
            height,
            angle,
        }
    }

    /// 四个顶点, 依次为旋转前的左上, 右上, 右下, 左下
    pub fn points(&self) -> [PointF; 4] {
        let (sin, cos) = self.angle.to_radians().sin_cos();
        let half_w = self.width / 2.0;
        let half_h = self.height / 2.0;
        [
            (-half_w, -half_h),
            (half_w, -half_h),
            (half_w, half_h),
            (-half_w, half_h),
        ]
        .map(|(dx, dy)| {
            PointF::new(
                self.center.x + dx * cos - dy * sin,
                self.center.y + dx * sin + dy * cos,
            )
        })
    }

    /// 包含全部顶点的最小轴对齐矩形
    pub fn bounding_rect(&self) -> Rectangle {
        let points = self.points();
        let min_x = points.iter().map(|p| p.x).fold(f32::INFINITY, f32::min);
        let min_y = points.iter().map(|p| p.y).fold(f32::INFINITY, f32::min);
        let max_x = points.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max);
        let max_y = points.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max);
        Rectangle::new(
            min_x.floor() as i32,
            min_y.floor() as i32,
            max_x.ceil() as i32,
            max_y.ceil() as i32,
        )
    }

    /// 忽略旋转角度的轴对齐矩形
    pub fn to_rectangle(&self) -> Rectangle {
        let half_w = self.width / 2.0;
        let half_h = self.height / 2.0;
        Rectangle::new(
            (self.center.x - half_w).round() as i32,
            (self.center.y - half_h).round() as i32,
            (self.center.x + half_w).round() as i32,
            (self.center.y + half_h).round() as i32,
        )
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// 交并比, 通过凸多边形裁剪计算相交面积
    pub fn iou(&self, other: &RotatedRect) -> f32 {
        let inter = polygon_area(&clip_polygon(&self.points(), &other.points())).abs();
        let union = self.area() + other.area() - inter;
        if union <= f32::EPSILON {
            return 0.0;
        }
        (inter / union).clamp(0.0, 1.0)
    }
}

impl From<Rectangle> for RotatedRect {
    fn from(rect: Rectangle) -> Self {
        RotatedRect::new(rect.center(), rect.width() as f32, rect.height() as f32, 0.0)
    }
}

/// 多边形有向面积
fn polygon_area(points: &[PointF]) -> f32 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for (i, p) in points.iter().enumerate() {
        let q = points[(i + 1) % points.len()];
        sum += p.x * q.y - q.x * p.y;
    }
    sum / 2.0
}

fn cross(a: PointF, b: PointF, p: PointF) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

/// 线段 `pq` 与直线 `ab` 的交点
fn line_intersection(p: PointF, q: PointF, a: PointF, b: PointF) -> PointF {
    let cp = cross(a, b, p);
    let cq = cross(a, b, q);
    let denom = cp - cq;
    if denom.abs() <= f32::EPSILON {
        return q;
    }
    let t = cp / denom;
    PointF::new(p.x + t * (q.x - p.x), p.y + t * (q.y - p.y))
}

/// Sutherland-Hodgman 多边形裁剪, `clip` 须为凸多边形
fn clip_polygon(subject: &[PointF], clip: &[PointF]) -> Vec<PointF> {
    let clip_area = polygon_area(clip);
    if clip_area == 0.0 {
        return Vec::new();
    }
    let orientation = clip_area.signum();

    let mut output = subject.to_vec();
    for (i, &a) in clip.iter().enumerate() {
        let b = clip[(i + 1) % clip.len()];
        let input = std::mem::take(&mut output);
        if input.is_empty() {
            break;
        }
        let inside = |p: PointF| cross(a, b, p) * orientation >= 0.0;
        for (j, &current) in input.iter().enumerate() {
            let previous = input[(j + input.len() - 1) % input.len()];
            match (inside(previous), inside(current)) {
                (true, true) => output.push(current),
                (true, false) => output.push(line_intersection(previous, current, a, b)),
                (false, true) => {
                    output.push(line_intersection(previous, current, a, b));
                    output.push(current);
                }
                (false, false) => {}
            }
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rectangle_normalized() {
        let rect = Rectangle::new(10, 20, 0, 5);
        assert_eq!(rect, Rectangle::new(0, 5, 10, 20));
        assert_eq!(rect.width(), 10);
        assert_eq!(rect.height(), 15);
        assert_eq!(rect.area(), 150);
    }

    #[test]
    fn test_snap_to() {
        let rect = Rectangle::from_xywh(-10, -10, 50, 50);
        assert_eq!(rect.snap_to(Size::new(100, 100)), Rectangle::new(0, 0, 40, 40));

        let rect = Rectangle::from_xywh(90, 95, 50, 50);
        assert_eq!(rect.snap_to(Size::new(100, 100)), Rectangle::new(90, 95, 100, 100));

        let rect = Rectangle::from_xywh(200, 200, 10, 10);
        assert!(rect.snap_to(Size::new(100, 100)).is_empty());
    }

    #[test]
    fn test_rectangle_iou() {
        let a = Rectangle::new(0, 0, 10, 10);
        let b = Rectangle::new(5, 0, 15, 10);
        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(a.iou(&a), 1.0);
        assert_eq!(a.iou(&Rectangle::new(20, 20, 30, 30)), 0.0);
    }

    #[test]
    fn test_rotated_points() {
        let rect = RotatedRect::new(PointF::new(0.0, 0.0), 4.0, 2.0, 90.0);
        let points = rect.points();
        assert!((points[0].x - 1.0).abs() < 1e-5);
        assert!((points[0].y + 2.0).abs() < 1e-5);

        let rect = RotatedRect::new(PointF::new(10.5, 10.5), 3.0, 5.0, 0.0);
        assert_eq!(rect.bounding_rect(), Rectangle::new(9, 8, 12, 13));
        assert_eq!(rect.to_rectangle(), Rectangle::new(9, 8, 12, 13));
    }

    #[test]
    fn test_rotated_iou_matches_axis_aligned() {
        let a = RotatedRect::from(Rectangle::new(0, 0, 10, 10));
        let b = RotatedRect::from(Rectangle::new(5, 0, 15, 10));
        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-5);
        assert!((a.iou(&a) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_rotated_iou() {
        let square = RotatedRect::new(PointF::new(0.0, 0.0), 10.0, 10.0, 0.0);
        let turned = RotatedRect::new(PointF::new(0.0, 0.0), 10.0, 10.0, 90.0);
        assert!((square.iou(&turned) - 1.0).abs() < 1e-4);

        // 旋转 45 度的正方形与原正方形的交集为正八边形
        let diamond = RotatedRect::new(PointF::new(0.0, 0.0), 10.0, 10.0, 45.0);
        let octagon = 200.0 * (2.0f32.sqrt() - 1.0);
        let expected = octagon / (200.0 - octagon);
        assert!((square.iou(&diamond) - expected).abs() < 1e-3);

        let far = RotatedRect::new(PointF::new(100.0, 100.0), 10.0, 10.0, 30.0);
        assert_eq!(square.iou(&far), 0.0);
    }

    #[test]
    fn test_degenerate_iou() {
        let empty = RotatedRect::new(PointF::new(0.0, 0.0), 0.0, 0.0, 0.0);
        assert_eq!(empty.iou(&empty), 0.0);
    }
}
