//! Text rendering utilities for human-friendly diagnostics.
//!
//! Used by the container to format planning paths (circular dependency
//! errors), tier layouts (`Debug` output) and suggestions for contracts
//! that were requested but never registered.

/// Joins the segments of a planning path with arrows.
///
/// # Examples
/// ```
/// use strata_support::rendering::render_path;
///
/// let path = ["root:Customer", "orders:Repository", "root:Customer"];
/// assert_eq!(render_path(&path), "root:Customer → orders:Repository → root:Customer");
/// ```
pub fn render_path<S: AsRef<str>>(segments: &[S]) -> String {
    let mut out = String::new();
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 {
            out.push_str(" → ");
        }
        out.push_str(segment.as_ref());
    }
    out
}

/// One level of a container chain, as shown by [`render_tiers`].
#[derive(Debug, Clone)]
pub struct TierLine {
    /// Tier label, e.g. `root`, `repositories` or `shared`.
    pub label: String,
    /// Number of distinct contracts registered in the tier.
    pub contracts: usize,
}

/// Renders a container chain top-down.
///
/// ```text
/// root          (3 contracts)
///   ↓
/// repositories  (1 contract)
///   ↓
/// shared        (2 contracts)
/// ```
pub fn render_tiers(tiers: &[TierLine]) -> String {
    let width = tiers.iter().map(|t| t.label.len()).max().unwrap_or(0);
    let mut out = String::new();

    for (i, tier) in tiers.iter().enumerate() {
        if i > 0 {
            out.push_str("  ↓\n");
        }
        let noun = if tier.contracts == 1 { "contract" } else { "contracts" };
        out.push_str(&format!(
            "{:<width$}  ({} {noun})\n",
            tier.label,
            tier.contracts,
            width = width,
        ));
    }

    out
}

/// Strips module paths from a type name, keeping generics readable.
///
/// ```
/// use strata_support::rendering::short_type_name;
///
/// assert_eq!(short_type_name("shop::orders::OrderService"), "OrderService");
/// assert_eq!(short_type_name("dyn shop::contracts::Customer"), "dyn Customer");
/// assert_eq!(
///     short_type_name("alloc::sync::Arc<dyn shop::Repo<shop::Order>>"),
///     "Arc<dyn Repo<Order>>"
/// );
/// ```
pub fn short_type_name(full_name: &str) -> String {
    let mut out = String::with_capacity(full_name.len());
    let mut segment_start = 0;

    for (idx, ch) in full_name.char_indices() {
        match ch {
            '<' | '>' | ',' | ' ' | '(' | ')' | '&' | '[' | ']' => {
                out.push_str(last_segment(&full_name[segment_start..idx]));
                out.push(ch);
                segment_start = idx + ch.len_utf8();
            }
            _ => {}
        }
    }
    out.push_str(last_segment(&full_name[segment_start..]));
    out
}

fn last_segment(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}

/// Picks registered names that look like the requested one.
///
/// Matches are ranked: containment of the short name first, then the
/// length of the common prefix. At most `limit` names are returned.
pub fn closest_matches(requested: &str, registered: &[&str], limit: usize) -> Vec<String> {
    let wanted = comparable(requested);
    if wanted.is_empty() {
        return Vec::new();
    }

    let mut ranked: Vec<(usize, &str)> = registered
        .iter()
        .filter_map(|&candidate| {
            let short = comparable(candidate);
            if short.contains(&wanted) || wanted.contains(&short) {
                return Some((1000, candidate));
            }
            let prefix = short
                .chars()
                .zip(wanted.chars())
                .take_while(|(a, b)| a == b)
                .count();
            (prefix >= 3).then_some((prefix, candidate))
        })
        .collect();

    ranked.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
    ranked
        .into_iter()
        .take(limit)
        .map(|(_, name)| name.to_string())
        .collect()
}

fn comparable(name: &str) -> String {
    short_type_name(name).trim_start_matches("dyn ").to_lowercase()
}
