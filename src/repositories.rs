use crate::db::DbContext;
use crate::error::{AppError, AppResult};
use crate::models::{Presentation, Speaker};
use async_trait::async_trait;
use std::sync::Arc;

/// Presentation lookup and maintenance
#[async_trait]
pub trait PresentationRepository: Send + Sync {
    /// Store a new presentation; the id of the argument is ignored
    async fn create(&self, presentation: Presentation) -> AppResult<Presentation>;

    /// Get a presentation with its speaker attached
    async fn get(&self, id: i64) -> AppResult<Option<Presentation>>;

    /// All presentations ordered by id, speakers attached
    async fn list(&self) -> AppResult<Vec<Presentation>>;

    async fn update(&self, presentation: Presentation) -> AppResult<Presentation>;

    /// Returns whether a presentation was removed
    async fn delete(&self, id: i64) -> AppResult<bool>;
}

/// Speaker lookup and maintenance
#[async_trait]
pub trait SpeakerRepository: Send + Sync {
    async fn create(&self, speaker: Speaker) -> AppResult<Speaker>;
    async fn get(&self, id: i64) -> AppResult<Option<Speaker>>;
    async fn list(&self) -> AppResult<Vec<Speaker>>;
    async fn update(&self, speaker: Speaker) -> AppResult<Speaker>;

    /// Fails while any presentation still references the speaker
    async fn delete(&self, id: i64) -> AppResult<bool>;
}

/// [`PresentationRepository`] over the in-memory database
pub struct InMemoryPresentationRepository {
    context: Arc<DbContext>,
}

impl InMemoryPresentationRepository {
    pub fn new(context: Arc<DbContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl PresentationRepository for InMemoryPresentationRepository {
    async fn create(&self, presentation: Presentation) -> AppResult<Presentation> {
        self.context
            .write(|tables| {
                if !tables.speakers.contains_key(&presentation.speaker_id) {
                    return Err(AppError::Validation(format!(
                        "Speaker {} does not exist",
                        presentation.speaker_id
                    )));
                }
                let id = tables.next_presentation_id();
                let stored = Presentation {
                    id,
                    speaker: None,
                    ..presentation
                };
                tables.presentations.insert(id, stored.clone());
                Ok(stored)
            })
            .await?
    }

    async fn get(&self, id: i64) -> AppResult<Option<Presentation>> {
        let found = self
            .context
            .read(|tables| {
                tables.presentations.get(&id).map(|p| Presentation {
                    speaker: tables.speakers.get(&p.speaker_id).cloned(),
                    ..p.clone()
                })
            })
            .await?;
        Ok(found)
    }

    async fn list(&self) -> AppResult<Vec<Presentation>> {
        let all = self
            .context
            .read(|tables| {
                tables
                    .presentations
                    .values()
                    .map(|p| Presentation {
                        speaker: tables.speakers.get(&p.speaker_id).cloned(),
                        ..p.clone()
                    })
                    .collect()
            })
            .await?;
        Ok(all)
    }

    async fn update(&self, presentation: Presentation) -> AppResult<Presentation> {
        self.context
            .write(|tables| {
                if !tables.presentations.contains_key(&presentation.id) {
                    return Err(AppError::NotFound(format!("Presentation {}", presentation.id)));
                }
                if !tables.speakers.contains_key(&presentation.speaker_id) {
                    return Err(AppError::Validation(format!(
                        "Speaker {} does not exist",
                        presentation.speaker_id
                    )));
                }
                let stored = Presentation {
                    speaker: None,
                    ..presentation
                };
                tables.presentations.insert(stored.id, stored.clone());
                Ok(stored)
            })
            .await?
    }

    async fn delete(&self, id: i64) -> AppResult<bool> {
        let removed = self
            .context
            .write(|tables| tables.presentations.remove(&id).is_some())
            .await?;
        Ok(removed)
    }
}

/// [`SpeakerRepository`] over the in-memory database
pub struct InMemorySpeakerRepository {
    context: Arc<DbContext>,
}

impl InMemorySpeakerRepository {
    pub fn new(context: Arc<DbContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl SpeakerRepository for InMemorySpeakerRepository {
    async fn create(&self, speaker: Speaker) -> AppResult<Speaker> {
        let stored = self
            .context
            .write(|tables| {
                let id = tables.next_speaker_id();
                let stored = Speaker { id, ..speaker };
                tables.speakers.insert(id, stored.clone());
                stored
            })
            .await?;
        Ok(stored)
    }

    async fn get(&self, id: i64) -> AppResult<Option<Speaker>> {
        Ok(self
            .context
            .read(|tables| tables.speakers.get(&id).cloned())
            .await?)
    }

    async fn list(&self) -> AppResult<Vec<Speaker>> {
        Ok(self
            .context
            .read(|tables| tables.speakers.values().cloned().collect())
            .await?)
    }

    async fn update(&self, speaker: Speaker) -> AppResult<Speaker> {
        self.context
            .write(|tables| match tables.speakers.get_mut(&speaker.id) {
                Some(existing) => {
                    *existing = speaker.clone();
                    Ok(speaker)
                }
                None => Err(AppError::NotFound(format!("Speaker {}", speaker.id))),
            })
            .await?
    }

    async fn delete(&self, id: i64) -> AppResult<bool> {
        self.context
            .write(|tables| {
                let referenced = tables.presentations.values().any(|p| p.speaker_id == id);
                if referenced {
                    return Err(AppError::Validation(format!(
                        "Speaker {} still has presentations",
                        id
                    )));
                }
                Ok(tables.speakers.remove(&id).is_some())
            })
            .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DbContextOptions, InMemoryDatabaseRoot};

    async fn context() -> Arc<DbContext> {
        let root = InMemoryDatabaseRoot::new();
        let ctx = DbContext::open(&root, &DbContextOptions::in_memory("repositories"));
        ctx.ensure_created().await;
        Arc::new(ctx)
    }

    fn speaker(first: &str) -> Speaker {
        Speaker {
            id: 0,
            first_name: first.to_string(),
            last_name: "Speaker".to_string(),
            description: String::new(),
            email_address: None,
            phone_number: None,
            is_staff: false,
        }
    }

    fn presentation(title: &str, speaker_id: i64) -> Presentation {
        Presentation {
            id: 0,
            title: title.to_string(),
            description: String::new(),
            speaker_id,
            speaker: None,
        }
    }

    #[tokio::test]
    async fn test_presentations_attach_their_speaker() {
        let ctx = context().await;
        let speakers = InMemorySpeakerRepository::new(ctx.clone());
        let presentations = InMemoryPresentationRepository::new(ctx);

        let alice = speakers.create(speaker("Alice")).await.unwrap();
        let talk = presentations
            .create(presentation("Ownership in practice", alice.id))
            .await
            .unwrap();

        let loaded = presentations.get(talk.id).await.unwrap().unwrap();
        assert_eq!(loaded.speaker.as_ref().map(|s| s.id), Some(alice.id));
        assert_eq!(presentations.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_presentation_requires_existing_speaker() {
        let ctx = context().await;
        let presentations = InMemoryPresentationRepository::new(ctx);

        let result = presentations.create(presentation("Orphan", 42)).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_speaker_with_presentations_cannot_be_deleted() {
        let ctx = context().await;
        let speakers = InMemorySpeakerRepository::new(ctx.clone());
        let presentations = InMemoryPresentationRepository::new(ctx);

        let bob = speakers.create(speaker("Bob")).await.unwrap();
        let talk = presentations
            .create(presentation("Lifetimes", bob.id))
            .await
            .unwrap();

        assert!(speakers.delete(bob.id).await.is_err());
        assert!(presentations.delete(talk.id).await.unwrap());
        assert!(speakers.delete(bob.id).await.unwrap());
        assert!(!speakers.delete(bob.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_missing_speaker_is_not_found() {
        let ctx = context().await;
        let speakers = InMemorySpeakerRepository::new(ctx);

        let mut ghost = speaker("Ghost");
        ghost.id = 99;
        assert!(matches!(
            speakers.update(ghost).await,
            Err(AppError::NotFound(_))
        ));
    }
}
