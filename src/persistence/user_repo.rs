//! User/account persistence interface.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::errors::FabricError;

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub user_id: String,
    pub account: String,
    pub last_login: Option<DateTime<Utc>>,
    pub points: i64,
}

#[derive(Debug, Clone)]
pub struct UserRanking {
    pub user_id: String,
    pub points: i64,
    pub rank: u64,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create_user(&self, account: &str) -> Result<UserRecord, FabricError>;
    async fn find_by_id(&self, user_id: &str) -> Result<Option<UserRecord>, FabricError>;
    async fn find_by_account(&self, account: &str) -> Result<Option<UserRecord>, FabricError>;
    async fn update_last_login(&self, user_id: &str, at: DateTime<Utc>) -> Result<(), FabricError>;
    /// Top `limit` users by points, descending.
    async fn get_ranking(&self, limit: usize) -> Result<Vec<UserRanking>, FabricError>;
}

pub struct InMemoryUserRepository {
    by_id: DashMap<String, UserRecord>,
    by_account: DashMap<String, String>,
    next_id: std::sync::atomic::AtomicU64,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self {
            by_id: DashMap::new(),
            by_account: DashMap::new(),
            next_id: std::sync::atomic::AtomicU64::new(1),
        }
    }
}

impl Default for InMemoryUserRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create_user(&self, account: &str) -> Result<UserRecord, FabricError> {
        if self.by_account.contains_key(account) {
            return Err(FabricError::Routing(format!("account {account} already exists")));
        }
        let id = self.next_id.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let user_id = format!("u{id}");
        let record = UserRecord {
            user_id: user_id.clone(),
            account: account.to_string(),
            last_login: None,
            points: 25_000,
        };
        self.by_id.insert(user_id.clone(), record.clone());
        self.by_account.insert(account.to_string(), user_id);
        Ok(record)
    }

    async fn find_by_id(&self, user_id: &str) -> Result<Option<UserRecord>, FabricError> {
        Ok(self.by_id.get(user_id).map(|e| e.value().clone()))
    }

    async fn find_by_account(&self, account: &str) -> Result<Option<UserRecord>, FabricError> {
        let Some(user_id) = self.by_account.get(account).map(|e| e.value().clone()) else {
            return Ok(None);
        };
        self.find_by_id(&user_id).await
    }

    async fn update_last_login(&self, user_id: &str, at: DateTime<Utc>) -> Result<(), FabricError> {
        match self.by_id.get_mut(user_id) {
            Some(mut record) => {
                record.last_login = Some(at);
                Ok(())
            }
            None => Err(FabricError::Routing(format!("no such user {user_id}"))),
        }
    }

    async fn get_ranking(&self, limit: usize) -> Result<Vec<UserRanking>, FabricError> {
        let mut all: Vec<UserRecord> = self.by_id.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| b.points.cmp(&a.points));
        Ok(all
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(i, u)| UserRanking {
                user_id: u.user_id,
                points: u.points,
                rank: i as u64 + 1,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_find_round_trips() {
        let repo = InMemoryUserRepository::new();
        let created = repo.create_user("alice").await.unwrap();
        let found = repo.find_by_account("alice").await.unwrap().unwrap();
        assert_eq!(found.user_id, created.user_id);
    }

    #[tokio::test]
    async fn ranking_sorts_descending_by_points() {
        let repo = InMemoryUserRepository::new();
        let a = repo.create_user("a").await.unwrap();
        let b = repo.create_user("b").await.unwrap();
        repo.by_id.get_mut(&a.user_id).unwrap().points = 10_000;
        repo.by_id.get_mut(&b.user_id).unwrap().points = 40_000;

        let ranking = repo.get_ranking(10).await.unwrap();
        assert_eq!(ranking[0].user_id, b.user_id);
        assert_eq!(ranking[0].rank, 1);
    }
}
