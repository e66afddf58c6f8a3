use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::debug;

use crate::source::{Frame, ImageSource};

/// 支持的图像扩展名
const IMAGE_EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "bmp", "tif", "tiff", "webp"];

/// 是否为支持的图像文件
///
/// # 参数
///
/// * `path` - 文件路径
fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// 文件图像源, 读取单个图像文件或目录下的全部图像文件
pub struct FileSource {
    root: PathBuf,
    files: Vec<PathBuf>,
    cursor: usize,
}

impl FileSource {
    /// 创建文件图像源
    ///
    /// 目录中的图像按文件名排序, 不递归子目录
    ///
    /// # 参数
    ///
    /// * `path` - 图像文件或目录
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        let metadata =
            fs::metadata(&root).with_context(|| format!("无法访问输入路径: {}", root.display()))?;

        let files = if metadata.is_dir() {
            let mut files = Vec::new();
            for entry in fs::read_dir(&root)
                .with_context(|| format!("读取目录失败: {}", root.display()))?
            {
                let path = entry?.path();
                if path.is_file() && is_image_file(&path) {
                    files.push(path);
                }
            }
            files.sort();
            if files.is_empty() {
                bail!("目录中没有图像文件: {}", root.display());
            }
            files
        } else {
            vec![root.clone()]
        };

        debug!("输入路径 {} 共 {} 张图像", root.display(), files.len());
        Ok(Self {
            root,
            files,
            cursor: 0,
        })
    }

    /// 全部图像文件
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

impl ImageSource for FileSource {
    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    fn remaining(&self) -> usize {
        self.files.len() - self.cursor
    }

    fn next_frame(&mut self) -> Option<Result<Frame>> {
        let path = self.files.get(self.cursor)?;
        self.cursor += 1;

        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let frame = image::open(path)
            .with_context(|| format!("读取图像失败: {}", path.display()))
            .map(|image| Frame { name, image });
        Some(frame)
    }
}
