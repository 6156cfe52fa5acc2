/*
 * resolve/images.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Stage rendering labeled image figures and tables.
 */

use crate::html;
use crate::registry::ElementKind;
use crate::syntax::{self, ImageDefinition};

use super::{Stage, StageContext};

/// Rewrites `![caption](path){#fig-x}` to an anchor, the image and a bold
/// caption line. Table captions go above the image, figure captions below.
pub struct ImageStage;

impl Stage for ImageStage {
    fn name(&self) -> &str {
        "images"
    }

    fn apply(&self, text: &str, ctx: &mut StageContext<'_>) -> String {
        let definitions = syntax::image_definitions(text);
        if definitions.is_empty() {
            return text.to_string();
        }

        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for def in definitions {
            out.push_str(&text[last..def.span.start]);
            out.push_str(&render(&def, ctx));
            last = def.span.end;
        }
        out.push_str(&text[last..]);
        out
    }
}

fn render(def: &ImageDefinition, ctx: &StageContext<'_>) -> String {
    let kind = ElementKind::from_id(&def.id).unwrap_or(ElementKind::Figure);
    let (label, number) = ctx.element_label(&def.id, kind);
    let caption = if def.caption.is_empty() {
        format!("**{} {}**", label, number)
    } else {
        format!("**{} {}:** {}", label, number, def.caption)
    };

    // A declared width needs an HTML image, markdown images cannot carry it.
    let image = match def.attr.get("width") {
        Some(width) => format!(
            "<img src=\"{}\" alt=\"{}\" width=\"{}\">",
            html::escape_attr(&def.path),
            html::escape_attr(&def.caption),
            html::escape_attr(width)
        ),
        None => format!("![{}]({})", def.caption, def.path),
    };

    let anchor = format!("<a id=\"{}\"></a>", def.id);
    match kind {
        ElementKind::Table => format!("{}\n\n{}\n\n{}", anchor, caption, image),
        _ => format!("{}\n\n{}\n\n{}", anchor, image, caption),
    }
}
