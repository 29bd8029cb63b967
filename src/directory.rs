use async_trait::async_trait;

use crate::model::Guest;
use crate::store::StoreError;

/// Customer lookup used to pre-fill a new reservation.
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    async fn search(&self, term: &str) -> Result<Vec<Guest>, StoreError>;
}

/// Fixed customer list, matched case-insensitively on customer or dog name.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    guests: Vec<Guest>,
}

impl StaticDirectory {
    pub fn new(guests: Vec<Guest>) -> Self {
        Self { guests }
    }
}

#[async_trait]
impl CustomerDirectory for StaticDirectory {
    async fn search(&self, term: &str) -> Result<Vec<Guest>, StoreError> {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .guests
            .iter()
            .filter(|g| {
                g.customer_name.to_lowercase().contains(&needle)
                    || g.dog_name.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> StaticDirectory {
        StaticDirectory::new(vec![
            Guest::new("Sato Hanako", "Pochi"),
            Guest::new("Suzuki Ken", "Momo"),
            Guest::new("Takahashi", "Pochiko"),
        ])
    }

    #[tokio::test]
    async fn matches_customer_or_dog() {
        let dir = directory();
        let hits = dir.search("pochi").await.unwrap();
        assert_eq!(hits.len(), 2);
        let hits = dir.search("SUZUKI").await.unwrap();
        assert_eq!(hits, vec![Guest::new("Suzuki Ken", "Momo")]);
    }

    #[tokio::test]
    async fn blank_term_finds_nothing() {
        assert!(directory().search("  ").await.unwrap().is_empty());
    }
}
