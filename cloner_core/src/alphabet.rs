//! The fixed set of Finnish alphabet-naming phrases.
//!
//! One exemplar word per letter, spoken as "a niin kuin aurinko" and so on.
//! Process-wide constant data; the batch driver iterates it in letter order.

pub const EXEMPLAR_WORDS: [&str; 26] = [
    "aurinko", "banaani", "celcius", "delfiini", "elefantti", "fanta", "golf",
    "haukka", "ilta", "juusto", "kissa", "lamppu", "meri", "nalle", "omena",
    "puu", "quark", "ruusu", "sydän", "talo", "ukko", "vene", "watti",
    "xenon", "yksi", "zebra",
];

/// All 26 phrases in letter order, paired with their letter.
pub fn phrases() -> impl Iterator<Item = (char, String)> {
    EXEMPLAR_WORDS.iter().enumerate().map(|(i, word)| {
        let letter = (b'a' + i as u8) as char;
        (letter, format!("{letter} niin kuin {word}"))
    })
}
