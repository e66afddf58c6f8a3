/// 贪心非极大值抑制
///
/// 按置信度降序 (稳定排序, 同分时先出现者优先) 依次选取候选框,
/// 与已保留框的交并比大于 `threshold` 的候选框被抑制
///
/// # 参数
///
/// * `scores` - 候选框置信度
/// * `threshold` - 交并比阈值
/// * `iou` - 计算两个候选框下标对应交并比的函数
/// * `order` - 排序用的临时缓冲区
/// * `keep` - 保留的候选框下标, 按置信度降序
pub fn nms<F>(scores: &[f32], threshold: f32, iou: F, order: &mut Vec<usize>, keep: &mut Vec<usize>)
where
    F: Fn(usize, usize) -> f32,
{
    order.clear();
    keep.clear();
    order.extend(0..scores.len());
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    for &candidate in order.iter() {
        if keep.iter().all(|&kept| iou(kept, candidate) <= threshold) {
            keep.push(candidate);
        }
    }
}
