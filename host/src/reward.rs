//! Read-only reward query for the operator CLI.

use ceres_chain::RewardInfo;

/// Group a decimal string with underscores every three digits from the
/// right: `"1234567"` becomes `"1_234_567"`.
pub fn format_reward(value: &str) -> String {
    let mut grouped = String::with_capacity(value.len() + value.len() / 3);
    for (i, c) in value.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            grouped.push('_');
        }
        grouped.push(c);
    }
    grouped.chars().rev().collect()
}

/// Two-column table of the miner's reward balances.
pub fn render_table(info: &RewardInfo) -> String {
    let rows = [
        ("total reward", format_reward(&info.total)),
        ("claimed reward", format_reward(&info.claimed)),
        ("available reward", format_reward(&info.available)),
    ];
    let left = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
    let right = rows.iter().map(|(_, value)| value.len()).max().unwrap_or(0);

    let border = format!("+{}+{}+", "-".repeat(left + 2), "-".repeat(right + 2));
    let mut out = String::new();
    out.push_str(&border);
    for (label, value) in &rows {
        out.push('\n');
        out.push_str(&format!("| {label:<left$} | {value:<right$} |"));
    }
    out.push('\n');
    out.push_str(&border);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grouping_vectors() {
        assert_eq!(format_reward("1234567"), "1_234_567");
        assert_eq!(format_reward("12"), "12");
        assert_eq!(format_reward(""), "");
        assert_eq!(format_reward("123"), "123");
        assert_eq!(format_reward("1234"), "1_234");
        assert_eq!(format_reward("123456"), "123_456");
    }

    #[test]
    fn table_contains_all_rows() {
        let table = render_table(&RewardInfo {
            total: "1000000".to_string(),
            claimed: "1".to_string(),
            available: "999999".to_string(),
        });
        assert!(table.contains("| total reward     | 1_000_000 |"));
        assert!(table.contains("| claimed reward   | 1         |"));
        assert!(table.contains("| available reward | 999_999   |"));
        assert!(table.starts_with('+'));
        assert!(table.ends_with('+'));
    }
}
