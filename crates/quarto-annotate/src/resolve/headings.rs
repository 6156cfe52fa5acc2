/*
 * resolve/headings.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Stage removing attribute payloads from headings.
 */

use std::sync::LazyLock;

use regex::Regex;

use super::{Stage, StageContext};

/// An ATX heading ending in `{#id}`, `{.class}` or `{-}`. Braces that do not
/// open with `#`, `.` or `-` are left alone, so `\mathbf{x}` survives.
static HEADING_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^( {0,3}#{1,6}[ \t]+[^\n]*?)[ \t]*\{[#.-][^{}\n]*\}[ \t]*$")
        .expect("Invalid regex pattern for heading attributes")
});

/// Rewrites `## Intro {#sec-intro .unnumbered}` to `## Intro`.
pub struct HeadingStage;

impl Stage for HeadingStage {
    fn name(&self) -> &str {
        "headings"
    }

    fn apply(&self, text: &str, _ctx: &mut StageContext<'_>) -> String {
        HEADING_ATTR.replace_all(text, "$1").into_owned()
    }
}
