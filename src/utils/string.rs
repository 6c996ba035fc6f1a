/// Strip one layer of matching quotes from a literal. Interpreted (`"`) and
/// raw (`` ` ``) Go string forms are both handled; anything else comes back
/// unchanged.
pub fn unquote_string(s: &str) -> String {
    let s = s.trim();
    if s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('`') && s.ends_with('`')))
    {
        s[1..s.len() - 1].to_string()
    } else {
        s.to_string()
    }
}
