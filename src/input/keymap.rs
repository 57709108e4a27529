//! Kernel keycode → scan code translation.
//!
//! A fixed `const` lookup array indexed by kernel keycode, generated once
//! at compile time rather than a runtime-built `HashMap` — matching how
//! other small fixed lookup tables are expressed in this backend's driver
//! layer (see the ioctl constants in [`crate::sys`]). Only the subset of
//! keycodes needed for letters, digits, common punctuation, arrows,
//! modifiers and a handful of named keys is populated; everything else,
//! including the touch pseudo-key, maps to [`Scancode::Unknown`] and is
//! silently dropped by the reader.

/// A translated key identity, independent of the kernel's numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Scancode {
    Unknown,
    A, B, C, D, E, F, G, H, I, J, K, L, M,
    N, O, P, Q, R, S, T, U, V, W, X, Y, Z,
    Num0, Num1, Num2, Num3, Num4, Num5, Num6, Num7, Num8, Num9,
    Enter,
    Escape,
    Backspace,
    Tab,
    Space,
    Minus,
    Equal,
    LeftBracket,
    RightBracket,
    Backslash,
    Semicolon,
    Apostrophe,
    Grave,
    Comma,
    Period,
    Slash,
    CapsLock,
    LeftShift,
    RightShift,
    LeftCtrl,
    RightCtrl,
    LeftAlt,
    RightAlt,
    Up,
    Down,
    Left,
    Right,
}

const TABLE_LEN: usize = 128;

/// `table[keycode]` is the scancode that keycode translates to, or
/// `Scancode::Unknown` if the keycode is unmapped. Indices follow the
/// Linux `input-event-codes.h` numbering so the table reads as a direct
/// transcription of the kernel header.
const fn build_table() -> [Scancode; TABLE_LEN] {
    let mut table = [Scancode::Unknown; TABLE_LEN];
    table[1] = Scancode::Escape;
    table[2] = Scancode::Num1;
    table[3] = Scancode::Num2;
    table[4] = Scancode::Num3;
    table[5] = Scancode::Num4;
    table[6] = Scancode::Num5;
    table[7] = Scancode::Num6;
    table[8] = Scancode::Num7;
    table[9] = Scancode::Num8;
    table[10] = Scancode::Num9;
    table[11] = Scancode::Num0;
    table[12] = Scancode::Minus;
    table[13] = Scancode::Equal;
    table[14] = Scancode::Backspace;
    table[15] = Scancode::Tab;
    table[16] = Scancode::Q;
    table[17] = Scancode::W;
    table[18] = Scancode::E;
    table[19] = Scancode::R;
    table[20] = Scancode::T;
    table[21] = Scancode::Y;
    table[22] = Scancode::U;
    table[23] = Scancode::I;
    table[24] = Scancode::O;
    table[25] = Scancode::P;
    table[26] = Scancode::LeftBracket;
    table[27] = Scancode::RightBracket;
    table[28] = Scancode::Enter;
    table[29] = Scancode::LeftCtrl;
    table[30] = Scancode::A;
    table[31] = Scancode::S;
    table[32] = Scancode::D;
    table[33] = Scancode::F;
    table[34] = Scancode::G;
    table[35] = Scancode::H;
    table[36] = Scancode::J;
    table[37] = Scancode::K;
    table[38] = Scancode::L;
    table[39] = Scancode::Semicolon;
    table[40] = Scancode::Apostrophe;
    table[41] = Scancode::Grave;
    table[42] = Scancode::LeftShift;
    table[43] = Scancode::Backslash;
    table[44] = Scancode::Z;
    table[45] = Scancode::X;
    table[46] = Scancode::C;
    table[47] = Scancode::V;
    table[48] = Scancode::B;
    table[49] = Scancode::N;
    table[50] = Scancode::M;
    table[51] = Scancode::Comma;
    table[52] = Scancode::Period;
    table[53] = Scancode::Slash;
    table[54] = Scancode::RightShift;
    table[56] = Scancode::LeftAlt;
    table[57] = Scancode::Space;
    table[58] = Scancode::CapsLock;
    table[97] = Scancode::RightCtrl;
    table[100] = Scancode::RightAlt;
    table[103] = Scancode::Up;
    table[105] = Scancode::Left;
    table[106] = Scancode::Right;
    table[108] = Scancode::Down;
    table
}

const TABLE: [Scancode; TABLE_LEN] = build_table();

/// Translate a kernel keycode into a [`Scancode`]. Codes outside the
/// populated range, and the touch pseudo-key (`BTN_TOUCH`), resolve to
/// [`Scancode::Unknown`].
pub fn translate(keycode: u16) -> Scancode {
    if keycode == crate::sys::BTN_TOUCH {
        return Scancode::Unknown;
    }
    match TABLE.get(keycode as usize) {
        Some(&s) => s,
        None => Scancode::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letter_a_translates() {
        assert_eq!(translate(30), Scancode::A);
    }

    #[test]
    fn touch_pseudo_key_is_unknown() {
        assert_eq!(translate(crate::sys::BTN_TOUCH), Scancode::Unknown);
    }

    #[test]
    fn out_of_range_keycode_is_unknown() {
        assert_eq!(translate(65000), Scancode::Unknown);
    }
}
