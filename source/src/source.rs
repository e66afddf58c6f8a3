use anyhow::Result;
use image::DynamicImage;

/// 待处理的一张图像
#[derive(Debug, Clone)]
pub struct Frame {
    /// 图像名称, 用于输出与标注文件命名
    pub name: String,
    pub image: DynamicImage,
}

/// 图像源接口
pub trait ImageSource {
    /// 图像源描述
    fn describe(&self) -> String;
    /// 剩余图像数量
    fn remaining(&self) -> usize;
    /// 读取下一张图像, 图像源耗尽时返回 `None`
    ///
    /// 单张图像读取失败时返回 `Some(Err(..))`, 之后仍可继续读取
    fn next_frame(&mut self) -> Option<Result<Frame>>;
}
