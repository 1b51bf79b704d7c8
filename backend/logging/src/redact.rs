//! Secret masking for terminal output.

/// Show only the first and last four characters of a secret.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 12 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}…{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token("abcd1234efgh5678"), "abcd…5678");
        assert_eq!(mask_token("short"), "*****");
        assert_eq!(mask_token("ééééaaaaaaaaüüüü"), "éééé…üüüü");
    }
}
