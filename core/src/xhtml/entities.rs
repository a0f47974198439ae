/*
 * entities.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Ritagli, a web application utility toolkit.
 *
 * Ritagli is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Ritagli is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Ritagli.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Named and numeric HTML character references.

/// (entity name, character). Names are matched case-sensitively.
const ENTITIES: &[(&str, char)] = &[
    ("amp", '&'),
    ("lt", '<'),
    ("gt", '>'),
    ("quot", '"'),
    ("iexcl", '¡'),
    ("curren", '¤'),
    ("yen", '¥'),
    ("brvbar", '¦'),
    ("sect", '§'),
    ("uml", '¨'),
    ("copy", '©'),
    ("ordf", 'ª'),
    ("laquo", '«'),
    ("raquo", '»'),
    ("euro", '€'),
    ("pound", '£'),
    ("shy", '\u{AD}'),
    ("reg", '®'),
    ("macr", '¯'),
    ("deg", '°'),
    ("plusmn", '±'),
    ("sup1", '¹'),
    ("sup2", '²'),
    ("sup3", '³'),
    ("acute", '´'),
    ("micro", 'µ'),
    ("para", '¶'),
    ("middot", '·'),
    ("cedil", '¸'),
    ("ordm", 'º'),
    ("iquest", '¿'),
    ("ntilde", 'ñ'),
    ("Ntilde", 'Ñ'),
    ("aacute", 'á'),
    ("eacute", 'é'),
    ("iacute", 'í'),
    ("oacute", 'ó'),
    ("uacute", 'ú'),
    ("uuml", 'ü'),
    ("Aacute", 'Á'),
    ("Agrave", 'À'),
    ("Auml", 'Ä'),
    ("Acirc", 'Â'),
    ("Aring", 'Å'),
    ("Eacute", 'É'),
    ("Egrave", 'È'),
    ("Euml", 'Ë'),
    ("Ecirc", 'Ê'),
    ("Iacute", 'Í'),
    ("Igrave", 'Ì'),
    ("Iuml", 'Ï'),
    ("Icirc", 'Î'),
    ("Oacute", 'Ó'),
    ("Ograve", 'Ò'),
    ("Ouml", 'Ö'),
    ("Ocirc", 'Ô'),
    ("Uacute", 'Ú'),
    ("Ugrave", 'Ù'),
    ("Uuml", 'Ü'),
    ("Ucirc", 'Û'),
    ("frac12", '½'),
    ("frac34", '¾'),
    ("frac14", '¼'),
    ("Ccedil", 'Ç'),
    ("ccedil", 'ç'),
    ("eth", 'ð'),
    ("cent", '¢'),
    ("THORN", 'Þ'),
    ("thorn", 'þ'),
    ("ETH", 'Ð'),
    ("times", '×'),
    ("divide", '÷'),
    ("AElig", 'Æ'),
    ("hellip", '…'),
    ("bull", '•'),
    ("ldquo", '“'),
    ("rdquo", '”'),
    ("ndash", '–'),
    ("mdash", '—'),
    ("oline", '‾'),
    ("Alpha", 'Α'),
    ("Beta", 'Β'),
    ("Gamma", 'Γ'),
    ("Delta", 'Δ'),
    ("Epsilon", 'Ε'),
    ("Lambda", 'Λ'),
    ("Sigma", 'Σ'),
    ("Pi", 'Π'),
    ("Psi", 'Ψ'),
    ("Omega", 'Ω'),
    ("alpha", 'α'),
    ("beta", 'β'),
    ("gamma", 'γ'),
    ("delta", 'δ'),
    ("epsilon", 'ε'),
    ("lambda", 'λ'),
    ("sigma", 'σ'),
    ("pi", 'π'),
    ("zeta", 'ζ'),
    ("omega", 'ω'),
    ("forall", '∀'),
    ("part", '∂'),
    ("exist", '∃'),
    ("empty", '∅'),
    ("isin", '∈'),
    ("notin", '∉'),
    ("sum", '∑'),
    ("infin", '∞'),
    ("minus", '−'),
    ("loz", '◊'),
    ("spades", '♠'),
    ("clubs", '♣'),
    ("hearts", '♥'),
    ("diams", '♦'),
    ("nbsp", '\u{A0}'),
];

fn lookup_name(name: &str) -> Option<char> {
    ENTITIES.iter().find(|(n, _)| *n == name).map(|&(_, c)| c)
}

fn lookup_char(c: char) -> Option<&'static str> {
    ENTITIES.iter().find(|&&(_, ch)| ch == c).map(|&(n, _)| n)
}

/// Parse the digits of a numeric reference. None when malformed.
fn numeric(digits: &str, radix: u32) -> Option<char> {
    u32::from_str_radix(digits, radix).ok().and_then(char::from_u32)
}

/// Replace character references with the characters they name.
///
/// `&#xHH;` and `&#NN;` are numeric references; named references come from the table and
/// unknown names leave the `&` in place. A reference is only tried when at least three
/// characters follow the `&`. A malformed numeric reference ends decoding: the text
/// decoded so far is returned.
pub fn decode(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < len {
        let c = chars[i];
        if c != '&' || i + 3 >= len {
            out.push(c);
            i += 1;
            continue;
        }
        let Some(semi) = chars[i + 1..].iter().position(|&ch| ch == ';').map(|p| p + i + 1) else {
            out.push(c);
            i += 1;
            continue;
        };
        if chars[i + 1] == '#' {
            let (start, radix) = if chars[i + 2] == 'x' { (i + 3, 16) } else { (i + 2, 10) };
            let digits: String = chars.get(start..semi).unwrap_or(&[]).iter().collect();
            match numeric(&digits, radix) {
                Some(decoded) => out.push(decoded),
                None => return out,
            }
            i = semi + 1;
        } else {
            let name: String = chars[i + 1..semi].iter().collect();
            match lookup_name(&name) {
                Some(decoded) => {
                    out.push(decoded);
                    i = semi + 1;
                }
                None => {
                    out.push(c);
                    i += 1;
                }
            }
        }
    }
    out
}

/// Replace every character that has a named entity with `&name;`.
pub fn encode(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 2);
    for c in text.chars() {
        match lookup_char(c) {
            Some(name) => {
                out.push('&');
                out.push_str(name);
                out.push(';');
            }
            None => out.push(c),
        }
    }
    out
}
