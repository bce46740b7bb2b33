#[cfg(test)]
pub mod test_helpers;

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
