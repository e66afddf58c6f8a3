use std::ffi::{CStr, CString, c_char};
use std::ptr;

use crate::result::OcrResult;

/// C 兼容的矩形
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CRectangle {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

/// C 兼容的检测结果
///
/// `text` 为堆上分配的以 NUL 结尾的字符串, 须通过 [`CResult::release`] 或
/// [`beholder_result_release`] 释放, 重复释放为空操作
#[repr(C)]
#[derive(Debug)]
pub struct CResult {
    pub text: *mut c_char,
    pub bbox: CRectangle,
    pub box_rot_angle: f64,
    pub confidence: f64,
}

impl CResult {
    pub fn from_result(result: &OcrResult) -> Self {
        // 内部的 NUL 字符无法在 C 字符串中表示
        let text = CString::new(result.text.replace('\0', "")).unwrap_or_default();
        Self {
            text: text.into_raw(),
            bbox: CRectangle {
                left: result.bbox.left as f64,
                top: result.bbox.top as f64,
                right: result.bbox.right as f64,
                bottom: result.bbox.bottom as f64,
            },
            box_rot_angle: result.box_rot_angle,
            confidence: result.confidence,
        }
    }

    /// 读取文本, 已释放时返回 `None`
    pub fn text(&self) -> Option<&CStr> {
        if self.text.is_null() {
            return None;
        }
        // text 只可能来自 CString::into_raw
        Some(unsafe { CStr::from_ptr(self.text) })
    }

    /// 释放文本内存
    pub fn release(&mut self) {
        if self.text.is_null() {
            return;
        }
        drop(unsafe { CString::from_raw(self.text) });
        self.text = ptr::null_mut();
    }
}

/// 释放 [`CResult`] 持有的文本内存
///
/// # Safety
///
/// `result` 须为空指针或指向由 [`OcrResult::to_c`] 创建的有效 [`CResult`]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn beholder_result_release(result: *mut CResult) {
    if let Some(result) = unsafe { result.as_mut() } {
        result.release();
    }
}
