use regex::Regex;
use std::sync::OnceLock;

use crate::model::Category;

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").expect("email regex")
    })
}

fn phone_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\+?[0-9][0-9 ()\-]{5,20}$").expect("phone regex"))
}

fn link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^https?://\S+$").expect("link regex"))
}

/// Local guess for obviously-shaped content. `None` when nothing matches.
pub fn guess_category(content: &str) -> Option<Category> {
    let content = content.trim();
    if link_re().is_match(content) {
        return Some(Category::Link);
    }
    if email_re().is_match(content) {
        return Some(Category::Email);
    }
    if phone_re().is_match(content) {
        // E.164 allows at most 15 digits.
        let digits = content.chars().filter(|c| c.is_ascii_digit()).count();
        if (7..=15).contains(&digits) {
            return Some(Category::Phone);
        }
    }
    None
}
