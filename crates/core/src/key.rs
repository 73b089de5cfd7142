const SEPARATOR: char = '/';

/// Builds the storage key for a (database, collection) pair.
///
/// Components are joined with `/`. Each component is escaped first (`%` to
/// `%25`, `/` to `%2F`) so names containing the separator cannot collide with
/// another pair. Plain names produce the bare `database/collection` form.
pub fn record_key(database: &str, collection: &str) -> String {
    let mut key = String::with_capacity(database.len() + collection.len() + 1);
    push_escaped(&mut key, database);
    key.push(SEPARATOR);
    push_escaped(&mut key, collection);
    key
}

fn push_escaped(out: &mut String, component: &str) {
    for ch in component.chars() {
        match ch {
            '%' => out.push_str("%25"),
            SEPARATOR => out.push_str("%2F"),
            other => out.push(other),
        }
    }
}
