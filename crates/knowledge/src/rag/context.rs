//! Context assembly from ranked hits.

use crate::types::Hit;

fn format_block(hit: &Hit) -> String {
    format!("{} ({})\n{}\n", hit.source, hit.section, hit.text)
}

/// Pack hits, in rank order, into at most `max_chars` characters.
///
/// Each hit becomes `"<source> (<section>)\n<text>\n"`. A block that does not
/// fit is cut to the remaining budget and packing stops there.
pub fn build_context(hits: &[Hit], max_chars: usize) -> String {
    let mut context = String::new();
    let mut remaining = max_chars;

    for hit in hits {
        if remaining == 0 {
            break;
        }

        let block = format_block(hit);
        let block_chars = block.chars().count();
        if block_chars <= remaining {
            context.push_str(&block);
            remaining -= block_chars;
        } else {
            context.extend(block.chars().take(remaining));
            break;
        }
    }

    context
}
