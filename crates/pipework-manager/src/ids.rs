/// One id or a batch of ids, for operations that accept either.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ids {
  One(String),
  Many(Vec<String>),
}

impl Ids {
  pub fn into_vec(self) -> Vec<String> {
    match self {
      Self::One(id) => vec![id],
      Self::Many(ids) => ids,
    }
  }
}

impl From<String> for Ids {
  fn from(id: String) -> Self {
    Self::One(id)
  }
}

impl From<&str> for Ids {
  fn from(id: &str) -> Self {
    Self::One(id.to_string())
  }
}

impl From<Vec<String>> for Ids {
  fn from(ids: Vec<String>) -> Self {
    Self::Many(ids)
  }
}

impl From<&[&str]> for Ids {
  fn from(ids: &[&str]) -> Self {
    Self::Many(ids.iter().map(|id| id.to_string()).collect())
  }
}
