use std::collections::HashMap;

use lazy_static::lazy_static;

/// Precomposed Vietnamese letters grouped by the base letter they fold to.
const FOLD_GROUPS: &[(&str, char)] = &[
    ("àáảãạăằắẳẵặâầấẩẫậ", 'a'),
    ("ÀÁẢÃẠĂẰẮẲẴẶÂẦẤẨẪẬ", 'A'),
    ("èéẻẽẹêềếểễệ", 'e'),
    ("ÈÉẺẼẸÊỀẾỂỄỆ", 'E'),
    ("ìíỉĩị", 'i'),
    ("ÌÍỈĨỊ", 'I'),
    ("òóỏõọôồốổỗộơờớởỡợ", 'o'),
    ("ÒÓỎÕỌÔỒỐỔỖỘƠỜỚỞỠỢ", 'O'),
    ("ùúủũụưừứửữự", 'u'),
    ("ÙÚỦŨỤƯỪỨỬỮỰ", 'U'),
    ("ỳýỷỹỵ", 'y'),
    ("ỲÝỶỸỴ", 'Y'),
    ("đ", 'd'),
    ("Đ", 'D'),
];

lazy_static! {
    static ref FOLD: HashMap<char, char> = FOLD_GROUPS
        .iter()
        .flat_map(|(letters, base)| letters.chars().map(move |c| (c, *base)))
        .collect();
}

/// Combining diacritical marks (tone marks, breve, circumflex, horn in decomposed form).
fn is_combining_mark(c: char) -> bool {
    ('\u{0300}'..='\u{036F}').contains(&c)
}

/// Strip Vietnamese diacritics, keeping the base letters and their case.
/// "tôi" -> "toi", "Đường" -> "Duong". Decomposed input folds the same way.
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| FOLD.get(&c).copied().unwrap_or(c))
        .collect()
}

/// Lowercase and strip diacritics, for loose comparison of words.
pub fn fold(text: &str) -> String {
    normalize(&text.to_lowercase())
}
