/// Returns the indices of the fixed-size records that differ between two byte images.
///
/// Records are compared by recursively halving the range and skipping halves whose bytes
/// are equal, so a mostly unchanged registry costs a handful of large `memcmp`s. Records
/// past the end of `previous` count as modified.
pub fn modified_records(previous: &[u8], current: &[u8], record_size: usize) -> Vec<usize> {
    if record_size == 0 {
        return vec![];
    }
    let common = previous.len().min(current.len()) / record_size;
    let mut modified = vec![];
    compare_range(previous, current, record_size, 0, common, &mut modified);
    modified.extend(common..current.len() / record_size);
    modified
}

fn compare_range(
    previous: &[u8],
    current: &[u8],
    record_size: usize,
    start: usize,
    end: usize,
    modified: &mut Vec<usize>,
) {
    if start >= end {
        return;
    }
    let bytes = start * record_size..end * record_size;
    if previous[bytes.clone()] == current[bytes] {
        return;
    }
    if end - start == 1 {
        modified.push(start);
        return;
    }
    let middle = start + (end - start) / 2;
    compare_range(previous, current, record_size, start, middle, modified);
    compare_range(previous, current, record_size, middle, end, modified);
}
