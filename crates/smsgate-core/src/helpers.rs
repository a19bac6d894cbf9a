//! Small helpers shared by the client, the CLI and SMS handlers.

/// Extract a SIM number from a gateway port string.
///
/// Takes the first run of ASCII digits (`"gsm-2"` gives 2). Falls back to
/// `default` when the string has no digits or the number does not fit.
///
/// # Example
///
/// ```
/// use smsgate_core::normalize_sim;
///
/// assert_eq!(normalize_sim("gsm-2", 1), 2);
/// assert_eq!(normalize_sim("3", 1), 3);
/// assert_eq!(normalize_sim("", 1), 1);
/// ```
pub fn normalize_sim(raw: &str, default: u32) -> u32 {
    let digits: String = raw
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_sim_plain_number() {
        assert_eq!(normalize_sim("4", 1), 4);
    }

    #[test]
    fn normalize_sim_prefixed() {
        assert_eq!(normalize_sim("gsm-2", 1), 2);
        assert_eq!(normalize_sim("port 12 (sim)", 1), 12);
    }

    #[test]
    fn normalize_sim_first_run_only() {
        assert_eq!(normalize_sim("2-7", 1), 2);
    }

    #[test]
    fn normalize_sim_falls_back() {
        assert_eq!(normalize_sim("", 1), 1);
        assert_eq!(normalize_sim("none", 3), 3);
        assert_eq!(normalize_sim("99999999999999999999", 1), 1);
    }
}
