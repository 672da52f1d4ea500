/// Render `value` within `[min, max]` as a bar of `width` stars.
///
/// `value_meter(40, 0, 100, 10)` is `[****      ]`.
pub fn value_meter(value: i64, min: i64, max: i64, width: usize) -> String {
    let range = max - min;
    let filled = if range > 0 {
        let frac = (value - min).clamp(0, range) as f64 / range as f64;
        ((frac * width as f64) as usize).min(width)
    } else {
        0
    };
    format!("[{}{}]", "*".repeat(filled), " ".repeat(width - filled))
}

/// Render a lake completion bitmap compressed into `width` slots.
///
/// Each slot shows how much of its share of the bitmap is filled: ` ` none,
/// `.` under half, `:` half or more, `|` all. A `>` precedes the slot holding
/// `cursor`. The bar is followed by the overall percentage and count, e.g.
/// `[|||:::>    ] 45% (9/20)`.
pub fn buffer_meter(status: &[bool], width: usize, cursor: Option<usize>) -> String {
    let total = status.len();
    let received = status.iter().filter(|b| **b).count();
    let slots = width.min(total);

    let mut bar = String::with_capacity(slots + 1);
    for i in 0..slots {
        let start = i * total / slots;
        let end = (i + 1) * total / slots;
        if cursor.is_some_and(|c| (start..end).contains(&c)) {
            bar.push('>');
        }
        let filled = status[start..end].iter().filter(|b| **b).count();
        let span = end - start;
        bar.push(if filled == 0 {
            ' '
        } else if filled * 2 < span {
            '.'
        } else if filled < span {
            ':'
        } else {
            '|'
        });
    }
    if slots < width {
        bar.push_str(&" ".repeat(width - slots));
    }

    let percent = if total > 0 { received * 100 / total } else { 0 };
    format!("[{bar}] {percent}% ({received}/{total})")
}
