//! Normalize command handler.

use unattend_core::{normalize_name, significant_tokens, slug};

/// Print how `name` is matched against directory names.
pub fn execute(name: &str) {
    let normalized = normalize_name(name);
    println!("normalized = {normalized}");
    println!("tokens     = {}", significant_tokens(&normalized).join(", "));
    println!("slug       = {}", slug(name));
}
