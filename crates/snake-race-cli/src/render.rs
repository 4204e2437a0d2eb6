//! Plain-text frame rendering.

use snake_race_runtime::prelude::*;

/// Glyphs used for the body cells of successive agents.
const BODY_GLYPHS: &[char] = &['o', '+', '*', '#', '%', '@', '&', '='];

/// Draw a frame as a bordered character grid.
///
/// Heads are drawn with the agent's index digit (mod 10), bodies with a
/// per-agent glyph, dead agents in `x`. Where agents overlap, the later
/// agent wins.
pub fn render_ascii(frame: &Frame) -> String {
    let width = frame.width.max(0) as usize;
    let height = frame.height.max(0) as usize;
    let mut cells = vec![vec!['.'; width]; height];

    for (index, agent) in frame.agents.iter().enumerate() {
        let body_glyph = if agent.alive {
            BODY_GLYPHS[index % BODY_GLYPHS.len()]
        } else {
            'x'
        };
        for (i, pos) in agent.body.iter().enumerate().rev() {
            if pos.x < 0 || pos.y < 0 || pos.x >= frame.width || pos.y >= frame.height {
                continue;
            }
            let glyph = if i == 0 {
                char::from_digit((index % 10) as u32, 10).unwrap_or('?')
            } else {
                body_glyph
            };
            cells[pos.y as usize][pos.x as usize] = glyph;
        }
    }

    let border = format!("+{}+", "-".repeat(width));
    let mut out = String::with_capacity((width + 3) * (height + 2));
    out.push_str(&border);
    out.push('\n');
    for row in cells {
        out.push('|');
        out.extend(row);
        out.push_str("|\n");
    }
    out.push_str(&border);
    out.push('\n');
    out
}
