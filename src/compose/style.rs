use anyhow::{Result, anyhow};

/// Fill and stroke colors as straight (non-premultiplied) RGBA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub bright: [u8; 4],
    pub dark: [u8; 4],
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            bright: [255, 255, 255, 255],
            dark: [0, 0, 0, 255],
        }
    }
}

impl Palette {
    pub fn from_hex(bright: &str, dark: &str) -> Result<Self> {
        Ok(Self {
            bright: parse_hex_color(bright)?,
            dark: parse_hex_color(dark)?,
        })
    }
}

/// Accepts `#rgb`, `#rrggbb` and `#rrggbbaa`.
pub fn parse_hex_color(value: &str) -> Result<[u8; 4]> {
    let hex = value.trim().trim_start_matches('#');
    let digits: Vec<u8> = hex
        .chars()
        .map(|ch| {
            ch.to_digit(16)
                .map(|digit| digit as u8)
                .ok_or_else(|| anyhow!("invalid color '{}'", value))
        })
        .collect::<Result<_>>()?;
    let pair = |hi: u8, lo: u8| hi * 16 + lo;
    match digits.as_slice() {
        [r, g, b] => Ok([pair(*r, *r), pair(*g, *g), pair(*b, *b), 255]),
        [r1, r2, g1, g2, b1, b2] => Ok([pair(*r1, *r2), pair(*g1, *g2), pair(*b1, *b2), 255]),
        [r1, r2, g1, g2, b1, b2, a1, a2] => Ok([
            pair(*r1, *r2),
            pair(*g1, *g2),
            pair(*b1, *b2),
            pair(*a1, *a2),
        ]),
        _ => Err(anyhow!("invalid color '{}'", value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_and_long_forms() {
        assert_eq!(parse_hex_color("#fff").unwrap(), [255, 255, 255, 255]);
        assert_eq!(parse_hex_color("#c40000").unwrap(), [196, 0, 0, 255]);
        assert_eq!(parse_hex_color("00000080").unwrap(), [0, 0, 0, 128]);
    }

    #[test]
    fn rejects_malformed_colors() {
        assert!(parse_hex_color("#ggg").is_err());
        assert!(parse_hex_color("#12345").is_err());
        assert!(parse_hex_color("").is_err());
    }
}
