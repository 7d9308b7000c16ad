/// Derives the URL identifier for an article from its title.
///
/// Lowercases, keeps ASCII alphanumerics, and joins the remaining words with
/// single hyphens. An empty title stays empty; uniqueness is the database's
/// job, not ours.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_separator = false;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }
    slug
}
