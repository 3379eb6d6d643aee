//! Blog service
//!
//! Business logic for blogs, comments, reactions and the engagement
//! counters that hang off them. This is the only layer that talks to
//! both the repositories and the cache coordinator, and it owns the
//! consistency rules between them:
//!
//! - Reads go through the cache (miss populates it with a class-specific
//!   TTL); the database answer always wins when the cache is down.
//! - Mutations write the database first, then invalidate the affected
//!   key families from detached tasks.
//! - Counter columns move only through atomic in-place increments, and
//!   a reaction's counter adjustments are awaited before the call
//!   returns, so the caller observes the error if one is lost.
//!
//! Every public operation is bounded by the request timeout; work that
//! outlives the request runs on the [`TaskPool`] with its own budget.

use crate::cache::CacheCoordinator;
use crate::config::{CacheConfig, ServiceConfig};
use crate::db::repositories::{
    BlogRepository, CommentRepository, ReactionRepository, ReadHistoryRepository, UserRepository,
};
use crate::models::{
    Blog, Comment, CreateBlogInput, CreateCommentInput, ListParams, MetricField, PagedResult,
    ReactionType, ReadHistory, UpdateBlogInput, UserRole,
};
use crate::services::tasks::TaskPool;
use anyhow::Context;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Maximum results returned by keyword search
const SEARCH_LIMIT: i64 = 50;

/// How many of the user's top tags feed recommendations
const RECOMMENDATION_TAGS: i64 = 3;

/// How many recommendations to return
const RECOMMENDATION_LIMIT: i64 = 3;

/// Cache key prefixes, one per key family
const KEY_BLOG_DETAIL: &str = "blog:id:";
const KEY_BLOG_LIST: &str = "blogs:list:";
const KEY_BLOGS_BY_USER: &str = "blogs:user:";
const KEY_BLOG_SEARCH: &str = "blogs:search:";
const KEY_COMMENTS: &str = "comments:blog:";

fn detail_key(id: i64) -> String {
    format!("{KEY_BLOG_DETAIL}{id}")
}

fn list_key(params: &ListParams) -> String {
    format!(
        "{KEY_BLOG_LIST}page:{}:limit:{}:field:{}",
        params.page,
        params.limit,
        params.sort.key_name()
    )
}

fn by_user_key(user_id: i64) -> String {
    format!("{KEY_BLOGS_BY_USER}{user_id}")
}

fn search_key(query: &str) -> String {
    format!("{KEY_BLOG_SEARCH}{query}")
}

fn comments_key(blog_id: i64) -> String {
    format!("{KEY_COMMENTS}{blog_id}")
}

/// Error types for blog service operations
#[derive(Debug, thiserror::Error)]
pub enum BlogServiceError {
    /// Requested entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Requester may not modify this resource
    #[error("Not authorized to modify this resource")]
    Unauthorized,

    /// User already holds this reaction on the blog
    #[error("Reaction already exists")]
    DuplicateReaction,

    /// No matching reaction to remove
    #[error("Reaction not found")]
    ReactionNotFound,

    /// Input failed validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// The synchronous request path exceeded its deadline
    #[error("Operation timed out")]
    Timeout,

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// TTLs and deadlines the service operates under
#[derive(Debug, Clone)]
pub struct BlogServiceSettings {
    /// TTL for blog detail entries
    pub detail_ttl: Duration,
    /// TTL for list, search and by-user entries
    pub list_ttl: Duration,
    /// TTL for comment list entries
    pub comment_ttl: Duration,
    /// Deadline for the synchronous request path
    pub request_timeout: Duration,
    /// Deadline for detached background tasks
    pub background_timeout: Duration,
    /// Deadline for the detached view-count increment
    pub view_count_timeout: Duration,
}

impl Default for BlogServiceSettings {
    fn default() -> Self {
        Self {
            detail_ttl: Duration::from_secs(600),
            list_ttl: Duration::from_secs(300),
            comment_ttl: Duration::from_secs(120),
            request_timeout: Duration::from_secs(30),
            background_timeout: Duration::from_secs(10),
            view_count_timeout: Duration::from_secs(5),
        }
    }
}

impl BlogServiceSettings {
    /// Build settings from loaded configuration
    pub fn from_config(cache: &CacheConfig, service: &ServiceConfig) -> Self {
        Self {
            detail_ttl: cache.detail_ttl(),
            list_ttl: cache.list_ttl(),
            comment_ttl: cache.comment_ttl(),
            request_timeout: service.request_timeout(),
            background_timeout: service.background_timeout(),
            view_count_timeout: service.view_count_timeout(),
        }
    }
}

/// Blog service
pub struct BlogService {
    blogs: Arc<dyn BlogRepository>,
    reactions: Arc<dyn ReactionRepository>,
    comments: Arc<dyn CommentRepository>,
    users: Arc<dyn UserRepository>,
    history: Arc<dyn ReadHistoryRepository>,
    cache: CacheCoordinator,
    tasks: TaskPool,
    settings: BlogServiceSettings,
}

impl BlogService {
    pub fn new(
        blogs: Arc<dyn BlogRepository>,
        reactions: Arc<dyn ReactionRepository>,
        comments: Arc<dyn CommentRepository>,
        users: Arc<dyn UserRepository>,
        history: Arc<dyn ReadHistoryRepository>,
        cache: CacheCoordinator,
        settings: BlogServiceSettings,
    ) -> Self {
        let tasks = TaskPool::new(settings.background_timeout);
        Self {
            blogs,
            reactions,
            comments,
            users,
            history,
            cache,
            tasks,
            settings,
        }
    }

    /// The pool running this service's detached work
    ///
    /// Exposed so shutdown can drain invalidation and counter tasks.
    pub fn tasks(&self) -> &TaskPool {
        &self.tasks
    }

    /// Bound a request-path future by the request timeout
    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, BlogServiceError>>,
    ) -> Result<T, BlogServiceError> {
        match tokio::time::timeout(self.settings.request_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(BlogServiceError::Timeout),
        }
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Get a blog by ID
    ///
    /// Read-through: cache hit returns immediately, miss loads from the
    /// database and populates the detail key. Either way a detached
    /// view-count increment is spawned; when it succeeds it deletes the
    /// detail key so the next read sees the new count. If it fails the
    /// cached entry is left alone.
    pub async fn get_blog(&self, id: i64) -> Result<Blog, BlogServiceError> {
        self.bounded(async {
            let key = detail_key(id);

            if let Some(blog) = self.cache.get::<Blog>(&key).await {
                self.spawn_view_bump(id);
                return Ok(blog);
            }

            let blog = self
                .blogs
                .get_by_id(id)
                .await?
                .ok_or_else(|| BlogServiceError::NotFound(format!("blog {id}")))?;

            self.cache.set(&key, &blog, self.settings.detail_ttl).await;
            self.spawn_view_bump(id);
            Ok(blog)
        })
        .await
    }

    /// List blogs with pagination and sorting
    pub async fn list_blogs(
        &self,
        params: ListParams,
    ) -> Result<PagedResult<Blog>, BlogServiceError> {
        self.bounded(async {
            let key = list_key(&params);

            if let Some(page) = self.cache.get::<PagedResult<Blog>>(&key).await {
                return Ok(page);
            }

            let items = self.blogs.list(&params).await?;
            let total = self.blogs.count().await?;
            let page = PagedResult::new(items, total, &params);

            self.cache.set(&key, &page, self.settings.list_ttl).await;
            Ok(page)
        })
        .await
    }

    /// Search blogs by keyword
    pub async fn search_blogs(&self, query: &str) -> Result<Vec<Blog>, BlogServiceError> {
        let query = query.trim().to_string();
        if query.is_empty() {
            return Err(BlogServiceError::ValidationError(
                "Search query cannot be empty".to_string(),
            ));
        }

        self.bounded(async {
            let key = search_key(&query);

            if let Some(hits) = self.cache.get::<Vec<Blog>>(&key).await {
                return Ok(hits);
            }

            let hits = self.blogs.search(&query, SEARCH_LIMIT).await?;
            self.cache.set(&key, &hits, self.settings.list_ttl).await;
            Ok(hits)
        })
        .await
    }

    /// All blogs written by a user, newest first
    pub async fn get_blogs_by_user(&self, user_id: i64) -> Result<Vec<Blog>, BlogServiceError> {
        self.bounded(async {
            let key = by_user_key(user_id);

            if let Some(blogs) = self.cache.get::<Vec<Blog>>(&key).await {
                return Ok(blogs);
            }

            let blogs = self.blogs.list_by_author(user_id).await?;
            self.cache.set(&key, &blogs, self.settings.list_ttl).await;
            Ok(blogs)
        })
        .await
    }

    /// All comments on a blog, oldest first
    pub async fn get_comments(&self, blog_id: i64) -> Result<Vec<Comment>, BlogServiceError> {
        self.bounded(async {
            let key = comments_key(blog_id);

            if let Some(comments) = self.cache.get::<Vec<Comment>>(&key).await {
                return Ok(comments);
            }

            let comments = self.comments.list_by_blog(blog_id).await?;
            self.cache
                .set(&key, &comments, self.settings.comment_ttl)
                .await;
            Ok(comments)
        })
        .await
    }

    // ------------------------------------------------------------------
    // Blog mutations
    // ------------------------------------------------------------------

    /// Create a new blog post
    pub async fn create_blog(&self, input: CreateBlogInput) -> Result<Blog, BlogServiceError> {
        validate_title(&input.title)?;
        validate_content(&input.content)?;

        self.bounded(async {
            let blog = self.blogs.create(&input).await?;
            self.spawn_listing_invalidation(blog.author_id);
            Ok(blog)
        })
        .await
    }

    /// Update a blog's editable fields
    ///
    /// Only the author or an admin may update. Engagement counters are
    /// never touched here.
    pub async fn update_blog(
        &self,
        id: i64,
        requester_id: i64,
        input: UpdateBlogInput,
    ) -> Result<Blog, BlogServiceError> {
        if !input.has_changes() {
            return Err(BlogServiceError::ValidationError(
                "No fields to update".to_string(),
            ));
        }
        if let Some(ref title) = input.title {
            validate_title(title)?;
        }
        if let Some(ref content) = input.content {
            validate_content(content)?;
        }

        self.bounded(async {
            let blog = self
                .blogs
                .get_by_id(id)
                .await?
                .ok_or_else(|| BlogServiceError::NotFound(format!("blog {id}")))?;

            self.authorize(blog.author_id, requester_id).await?;

            let updated = self.blogs.update(id, &input).await?;

            let cache = self.cache.clone();
            let key = detail_key(id);
            self.tasks.spawn("blog_update_invalidate", async move {
                cache.delete(&key).await;
                Ok(())
            });
            self.spawn_listing_invalidation(blog.author_id);

            Ok(updated)
        })
        .await
    }

    /// Delete a blog post
    pub async fn delete_blog(&self, id: i64, requester_id: i64) -> Result<(), BlogServiceError> {
        self.bounded(async {
            let blog = self
                .blogs
                .get_by_id(id)
                .await?
                .ok_or_else(|| BlogServiceError::NotFound(format!("blog {id}")))?;

            self.authorize(blog.author_id, requester_id).await?;

            self.blogs.delete(id).await?;

            let cache = self.cache.clone();
            self.tasks.spawn("blog_delete_invalidate", async move {
                cache.delete(&detail_key(id)).await;
                cache.delete(&comments_key(id)).await;
                Ok(())
            });
            self.spawn_listing_invalidation(blog.author_id);

            Ok(())
        })
        .await
    }

    // ------------------------------------------------------------------
    // Comments
    // ------------------------------------------------------------------

    /// Add a comment to a blog
    ///
    /// The comment row is the authoritative write; the comment_count
    /// bump and the cache invalidation run detached.
    pub async fn add_comment(
        &self,
        input: CreateCommentInput,
    ) -> Result<Comment, BlogServiceError> {
        validate_content(&input.content)?;

        self.bounded(async {
            let blog_id = input.blog_id;
            self.blogs
                .get_by_id(blog_id)
                .await?
                .ok_or_else(|| BlogServiceError::NotFound(format!("blog {blog_id}")))?;

            let comment = self.comments.create(&input).await?;

            let blogs = Arc::clone(&self.blogs);
            let cache = self.cache.clone();
            self.tasks.spawn("comment_count", async move {
                // The comment list is stale no matter what happens to
                // the counter, so drop it first.
                cache.delete(&comments_key(blog_id)).await;
                let touched = blogs
                    .update_metric(blog_id, MetricField::CommentCount, 1)
                    .await?;
                if touched {
                    cache.delete(&detail_key(blog_id)).await;
                }
                Ok(())
            });

            Ok(comment)
        })
        .await
    }

    /// Remove a comment
    ///
    /// Only the comment's author or an admin may remove it.
    pub async fn remove_comment(
        &self,
        comment_id: i64,
        requester_id: i64,
    ) -> Result<(), BlogServiceError> {
        self.bounded(async {
            let comment = self
                .comments
                .get_by_id(comment_id)
                .await?
                .ok_or_else(|| BlogServiceError::NotFound(format!("comment {comment_id}")))?;

            self.authorize(comment.author_id, requester_id).await?;

            let removed = self.comments.delete(comment_id).await?;
            if !removed {
                return Err(BlogServiceError::NotFound(format!("comment {comment_id}")));
            }

            let blog_id = comment.blog_id;
            let blogs = Arc::clone(&self.blogs);
            let cache = self.cache.clone();
            self.tasks.spawn("comment_remove", async move {
                cache.delete(&comments_key(blog_id)).await;
                let touched = blogs
                    .update_metric(blog_id, MetricField::CommentCount, -1)
                    .await?;
                if touched {
                    cache.delete(&detail_key(blog_id)).await;
                }
                Ok(())
            });

            Ok(())
        })
        .await
    }

    // ------------------------------------------------------------------
    // Reactions
    // ------------------------------------------------------------------

    /// Add (or flip to) a reaction on a blog
    ///
    /// State machine per user and blog: no reaction -> insert and bump
    /// the matching counter; opposite reaction -> switch the row and
    /// adjust both counters; same reaction -> `DuplicateReaction`.
    ///
    /// The row mutation is authoritative. Counter adjustments run
    /// concurrently and are all awaited; the first failure surfaces and
    /// successful siblings are not rolled back, which can leave a
    /// counter off by one until reconciliation. The unique index on
    /// (blog_id, user_id) decides races between concurrent adds.
    pub async fn add_reaction(
        &self,
        blog_id: i64,
        user_id: i64,
        reaction_type: ReactionType,
    ) -> Result<(), BlogServiceError> {
        self.bounded(async {
            self.blogs
                .get_by_id(blog_id)
                .await?
                .ok_or_else(|| BlogServiceError::NotFound(format!("blog {blog_id}")))?;

            match self.reactions.get(blog_id, user_id).await? {
                Some(existing) if existing.reaction_type == reaction_type => {
                    Err(BlogServiceError::DuplicateReaction)
                }
                Some(existing) => {
                    let flipped = self
                        .reactions
                        .set_type(blog_id, user_id, reaction_type)
                        .await?;
                    if !flipped {
                        // Row was removed between the read and the update
                        return Err(BlogServiceError::Internal(anyhow::anyhow!(
                            "reaction disappeared during flip"
                        )));
                    }
                    self.apply_metric_deltas(
                        blog_id,
                        vec![
                            (reaction_type.metric(), 1),
                            (existing.reaction_type.metric(), -1),
                        ],
                    )
                    .await
                }
                None => {
                    let inserted = self.reactions.add(blog_id, user_id, reaction_type).await?;
                    if !inserted {
                        // Lost the insert race to a concurrent request
                        return Err(BlogServiceError::DuplicateReaction);
                    }
                    self.apply_metric_deltas(blog_id, vec![(reaction_type.metric(), 1)])
                        .await
                }
            }
        })
        .await
    }

    /// Remove the user's reaction on a blog, whatever its type
    ///
    /// The existing row is read first so the matching counter can be
    /// decremented. Removing when no reaction is held is
    /// `ReactionNotFound`.
    pub async fn remove_reaction(
        &self,
        blog_id: i64,
        user_id: i64,
    ) -> Result<(), BlogServiceError> {
        self.bounded(async {
            let existing = self
                .reactions
                .get(blog_id, user_id)
                .await?
                .ok_or(BlogServiceError::ReactionNotFound)?;

            let removed = self.reactions.remove(blog_id, user_id).await?;
            if !removed {
                // A concurrent remove got there first
                return Err(BlogServiceError::ReactionNotFound);
            }

            self.apply_metric_deltas(blog_id, vec![(existing.reaction_type.metric(), -1)])
                .await
        })
        .await
    }

    // ------------------------------------------------------------------
    // Authorship probes
    // ------------------------------------------------------------------

    /// Whether `user_id` wrote the blog
    pub async fn is_blog_author(
        &self,
        blog_id: i64,
        user_id: i64,
    ) -> Result<bool, BlogServiceError> {
        let blog = self
            .blogs
            .get_by_id(blog_id)
            .await?
            .ok_or_else(|| BlogServiceError::NotFound(format!("blog {blog_id}")))?;
        Ok(blog.author_id == user_id)
    }

    /// Whether `user_id` wrote the comment
    pub async fn is_comment_author(
        &self,
        comment_id: i64,
        user_id: i64,
    ) -> Result<bool, BlogServiceError> {
        let comment = self
            .comments
            .get_by_id(comment_id)
            .await?
            .ok_or_else(|| BlogServiceError::NotFound(format!("comment {comment_id}")))?;
        Ok(comment.author_id == user_id)
    }

    // ------------------------------------------------------------------
    // Read history and recommendations
    // ------------------------------------------------------------------

    /// Record that a user read a blog and feed their tag affinity
    pub async fn add_read_history(
        &self,
        user_id: i64,
        blog_id: i64,
    ) -> Result<(), BlogServiceError> {
        self.bounded(async {
            let blog = self
                .blogs
                .get_by_id(blog_id)
                .await?
                .ok_or_else(|| BlogServiceError::NotFound(format!("blog {blog_id}")))?;

            self.history.record(user_id, blog_id).await?;
            self.history.bump_tag_affinity(user_id, &blog.tags).await?;
            Ok(())
        })
        .await
    }

    /// A user's reading history, most recent first
    pub async fn get_read_history(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<ReadHistory>, BlogServiceError> {
        self.bounded(async {
            let entries = self.history.list_for_user(user_id, limit).await?;
            Ok(entries)
        })
        .await
    }

    /// Recommend unread blogs matching the user's strongest tags
    ///
    /// Uncached: the result depends on the user's own history, which
    /// changes on every read.
    pub async fn get_recommendations(&self, user_id: i64) -> Result<Vec<Blog>, BlogServiceError> {
        self.bounded(async {
            let tags = self.history.top_tags(user_id, RECOMMENDATION_TAGS).await?;
            if tags.is_empty() {
                return Ok(Vec::new());
            }
            let blogs = self
                .blogs
                .list_unread_by_tags(user_id, &tags, RECOMMENDATION_LIMIT)
                .await?;
            Ok(blogs)
        })
        .await
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Author-or-admin check
    async fn authorize(
        &self,
        owner_id: i64,
        requester_id: i64,
    ) -> Result<(), BlogServiceError> {
        if owner_id == requester_id {
            return Ok(());
        }
        let role = self
            .users
            .get_role(requester_id)
            .await
            .context("Failed to resolve requester role")?;
        match role {
            Some(UserRole::Admin) => Ok(()),
            _ => Err(BlogServiceError::Unauthorized),
        }
    }

    /// Detached +1 on view_count with its own short budget
    ///
    /// On success the detail key is dropped so the next read picks up
    /// the new count; on failure the cached entry stays as it was.
    fn spawn_view_bump(&self, blog_id: i64) {
        let blogs = Arc::clone(&self.blogs);
        let cache = self.cache.clone();
        self.tasks.spawn_with_timeout(
            "view_count",
            self.settings.view_count_timeout,
            async move {
                let touched = blogs
                    .update_metric(blog_id, MetricField::ViewCount, 1)
                    .await?;
                if touched {
                    cache.delete(&detail_key(blog_id)).await;
                }
                Ok(())
            },
        );
    }

    /// Detached invalidation of the listing key families for an author
    fn spawn_listing_invalidation(&self, author_id: i64) {
        let cache = self.cache.clone();
        self.tasks.spawn("listing_invalidate", async move {
            cache.invalidate_prefix(KEY_BLOG_LIST).await;
            cache.invalidate_prefix(KEY_BLOG_SEARCH).await;
            cache.delete(&by_user_key(author_id)).await;
            Ok(())
        });
    }

    /// Apply a batch of counter deltas concurrently
    ///
    /// One task per field, each with the background budget. All tasks
    /// run to completion; the first error is surfaced and already
    /// applied siblings are left in place. The detail key is dropped
    /// afterwards regardless, since any subset may have landed.
    async fn apply_metric_deltas(
        &self,
        blog_id: i64,
        deltas: Vec<(MetricField, i64)>,
    ) -> Result<(), BlogServiceError> {
        let deadline = self.settings.background_timeout;
        let mut handles = Vec::with_capacity(deltas.len());

        for (field, delta) in deltas {
            let blogs = Arc::clone(&self.blogs);
            handles.push(tokio::spawn(async move {
                let touched =
                    tokio::time::timeout(deadline, blogs.update_metric(blog_id, field, delta))
                        .await
                        .map_err(|_| anyhow::anyhow!("{field} adjustment timed out"))?
                        .with_context(|| format!("failed to adjust {field}"))?;
                if !touched {
                    anyhow::bail!("blog {blog_id} missing during {field} adjustment");
                }
                Ok::<(), anyhow::Error>(())
            }));
        }

        let mut first_err: Option<anyhow::Error> = None;
        for handle in handles {
            let outcome = match handle.await {
                Ok(result) => result,
                Err(join_err) => Err(anyhow::Error::from(join_err).context("metric task failed")),
            };
            if let Err(e) = outcome {
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }

        self.cache.delete(&detail_key(blog_id)).await;

        match first_err {
            Some(e) => Err(BlogServiceError::Internal(e)),
            None => Ok(()),
        }
    }
}

fn validate_title(title: &str) -> Result<(), BlogServiceError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(BlogServiceError::ValidationError(
            "Title cannot be empty".to_string(),
        ));
    }
    if trimmed.len() > 255 {
        return Err(BlogServiceError::ValidationError(
            "Title cannot exceed 255 characters".to_string(),
        ));
    }
    Ok(())
}

fn validate_content(content: &str) -> Result<(), BlogServiceError> {
    if content.trim().is_empty() {
        return Err(BlogServiceError::ValidationError(
            "Content cannot be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Cache, MemoryCache};
    use crate::db::migrations::run_migrations;
    use crate::db::pool::create_test_pool;
    use crate::db::repositories::{
        SqlxBlogRepository, SqlxCommentRepository, SqlxReactionRepository,
        SqlxReadHistoryRepository, SqlxUserRepository,
    };
    use crate::models::SortField;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const ALICE: i64 = 1;
    const BOB: i64 = 2;
    const ADMIN: i64 = 3;

    struct Fixture {
        service: BlogService,
        blogs: Arc<dyn BlogRepository>,
        cache: CacheCoordinator,
    }

    async fn fixture() -> Fixture {
        fixture_with(|settings| settings, Duration::from_secs(2)).await
    }

    async fn fixture_with(
        tweak: impl FnOnce(BlogServiceSettings) -> BlogServiceSettings,
        cache_op_timeout: Duration,
    ) -> Fixture {
        let pool = create_test_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();

        let users = SqlxUserRepository::boxed(pool.clone());
        users.create("alice", UserRole::User).await.unwrap();
        users.create("bob", UserRole::User).await.unwrap();
        users.create("admin", UserRole::Admin).await.unwrap();

        let blogs = SqlxBlogRepository::boxed(pool.clone());
        let cache = CacheCoordinator::new(
            Arc::new(Cache::Memory(MemoryCache::new())),
            cache_op_timeout,
        );
        let settings = tweak(BlogServiceSettings::default());

        let service = BlogService::new(
            Arc::clone(&blogs),
            SqlxReactionRepository::boxed(pool.clone()),
            SqlxCommentRepository::boxed(pool.clone()),
            users,
            SqlxReadHistoryRepository::boxed(pool.clone()),
            cache.clone(),
            settings,
        );

        Fixture {
            service,
            blogs,
            cache,
        }
    }

    fn blog_input(author_id: i64, title: &str) -> CreateBlogInput {
        CreateBlogInput {
            author_id,
            title: title.to_string(),
            content: format!("{title} body"),
            tags: vec!["rust".to_string()],
        }
    }

    fn comment_input(blog_id: i64, author_id: i64, content: &str) -> CreateCommentInput {
        CreateCommentInput {
            blog_id,
            author_id,
            content: content.to_string(),
        }
    }

    /// Blog repository wrapper that counts reads and can refuse
    /// view-count bumps, keeping the cached detail entry in place.
    struct ProbeBlogRepository {
        inner: Arc<dyn BlogRepository>,
        gets: AtomicUsize,
        fail_view_bump: bool,
    }

    #[async_trait::async_trait]
    impl BlogRepository for ProbeBlogRepository {
        async fn create(&self, input: &CreateBlogInput) -> anyhow::Result<Blog> {
            self.inner.create(input).await
        }

        async fn get_by_id(&self, id: i64) -> anyhow::Result<Option<Blog>> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            self.inner.get_by_id(id).await
        }

        async fn list(&self, params: &ListParams) -> anyhow::Result<Vec<Blog>> {
            self.inner.list(params).await
        }

        async fn count(&self) -> anyhow::Result<i64> {
            self.inner.count().await
        }

        async fn list_by_author(&self, author_id: i64) -> anyhow::Result<Vec<Blog>> {
            self.inner.list_by_author(author_id).await
        }

        async fn search(&self, keyword: &str, limit: i64) -> anyhow::Result<Vec<Blog>> {
            self.inner.search(keyword, limit).await
        }

        async fn update(&self, id: i64, input: &UpdateBlogInput) -> anyhow::Result<Blog> {
            self.inner.update(id, input).await
        }

        async fn delete(&self, id: i64) -> anyhow::Result<bool> {
            self.inner.delete(id).await
        }

        async fn update_metric(
            &self,
            id: i64,
            field: MetricField,
            delta: i64,
        ) -> anyhow::Result<bool> {
            if self.fail_view_bump && field == MetricField::ViewCount {
                anyhow::bail!("view counter store offline");
            }
            self.inner.update_metric(id, field, delta).await
        }

        async fn list_unread_by_tags(
            &self,
            user_id: i64,
            tags: &[String],
            limit: i64,
        ) -> anyhow::Result<Vec<Blog>> {
            self.inner.list_unread_by_tags(user_id, tags, limit).await
        }
    }

    async fn probe_fixture(fail_view_bump: bool) -> (BlogService, Arc<ProbeBlogRepository>) {
        let pool = create_test_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();

        let users = SqlxUserRepository::boxed(pool.clone());
        users.create("alice", UserRole::User).await.unwrap();

        let probe = Arc::new(ProbeBlogRepository {
            inner: SqlxBlogRepository::boxed(pool.clone()),
            gets: AtomicUsize::new(0),
            fail_view_bump,
        });
        let cache = CacheCoordinator::new(
            Arc::new(Cache::Memory(MemoryCache::new())),
            Duration::from_secs(2),
        );

        let service = BlogService::new(
            Arc::clone(&probe) as Arc<dyn BlogRepository>,
            SqlxReactionRepository::boxed(pool.clone()),
            SqlxCommentRepository::boxed(pool.clone()),
            users,
            SqlxReadHistoryRepository::boxed(pool.clone()),
            cache,
            BlogServiceSettings::default(),
        );

        (service, probe)
    }

    // ------------------------------------------------------------------
    // Read path
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_get_blog_not_found() {
        let f = fixture().await;
        let err = f.service.get_blog(999).await.unwrap_err();
        assert!(matches!(err, BlogServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_get_blog_serves_from_cache_after_miss() {
        let (service, probe) = probe_fixture(true).await;
        let blog = service.create_blog(blog_input(ALICE, "Cached")).await.unwrap();
        service.tasks().wait_idle().await;

        let before = probe.gets.load(Ordering::SeqCst);
        let first = service.get_blog(blog.id).await.unwrap();
        service.tasks().wait_idle().await;
        let second = service.get_blog(blog.id).await.unwrap();
        service.tasks().wait_idle().await;

        assert_eq!(first.id, second.id);
        // Miss hits the store once; the failed view bump leaves the
        // cached entry in place, so the second read never reaches it.
        assert_eq!(probe.gets.load(Ordering::SeqCst), before + 1);
    }

    #[tokio::test]
    async fn test_get_blog_with_broken_cache_falls_back_to_store() {
        // Zero cache timeout: every cache call degrades.
        let f = fixture_with(|s| s, Duration::ZERO).await;
        let blog = f.service.create_blog(blog_input(ALICE, "Resilient")).await.unwrap();

        let fetched = f.service.get_blog(blog.id).await.unwrap();
        assert_eq!(fetched.title, "Resilient");
        f.service.tasks().wait_idle().await;
    }

    #[tokio::test]
    async fn test_view_count_becomes_visible_after_tasks_drain() {
        let f = fixture().await;
        let blog = f.service.create_blog(blog_input(ALICE, "Viewed")).await.unwrap();

        f.service.get_blog(blog.id).await.unwrap();
        f.service.tasks().wait_idle().await;

        let stored = f.blogs.get_by_id(blog.id).await.unwrap().unwrap();
        assert_eq!(stored.view_count, 1);

        // The successful bump invalidated the detail key, so the next
        // read observes the incremented count.
        let fetched = f.service.get_blog(blog.id).await.unwrap();
        assert_eq!(fetched.view_count, 1);
        f.service.tasks().wait_idle().await;
    }

    #[tokio::test]
    async fn test_failed_view_bump_leaves_cached_entry() {
        let (service, _probe) = probe_fixture(true).await;
        let blog = service.create_blog(blog_input(ALICE, "Stuck")).await.unwrap();
        service.tasks().wait_idle().await;

        service.get_blog(blog.id).await.unwrap();
        service.tasks().wait_idle().await;

        let fetched = service.get_blog(blog.id).await.unwrap();
        assert_eq!(fetched.view_count, 0);
        service.tasks().wait_idle().await;
    }

    #[tokio::test]
    async fn test_list_blogs_pages_and_caches() {
        let f = fixture().await;
        for i in 0..5 {
            f.service
                .create_blog(blog_input(ALICE, &format!("post {i}")))
                .await
                .unwrap();
        }
        f.service.tasks().wait_idle().await;

        let page = f
            .service
            .list_blogs(ListParams::new(1, 2, SortField::CreatedAt))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total, 5);
        assert!(page.has_next());

        let key = list_key(&ListParams::new(1, 2, SortField::CreatedAt));
        let cached: Option<PagedResult<Blog>> = f.cache.get(&key).await;
        assert!(cached.is_some());
    }

    #[tokio::test]
    async fn test_search_rejects_empty_query() {
        let f = fixture().await;
        let err = f.service.search_blogs("   ").await.unwrap_err();
        assert!(matches!(err, BlogServiceError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_search_finds_by_tag() {
        let f = fixture().await;
        f.service.create_blog(blog_input(ALICE, "Tagged")).await.unwrap();

        let hits = f.service.search_blogs("rust").await.unwrap();
        assert_eq!(hits.len(), 1);
        f.service.tasks().wait_idle().await;
    }

    #[tokio::test]
    async fn test_get_blogs_by_user() {
        let f = fixture().await;
        f.service.create_blog(blog_input(ALICE, "Mine")).await.unwrap();
        f.service.create_blog(blog_input(BOB, "Theirs")).await.unwrap();
        f.service.tasks().wait_idle().await;

        let mine = f.service.get_blogs_by_user(ALICE).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].title, "Mine");
    }

    // ------------------------------------------------------------------
    // Mutations and invalidation
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_create_blog_validation() {
        let f = fixture().await;

        let err = f
            .service
            .create_blog(CreateBlogInput {
                author_id: ALICE,
                title: "  ".to_string(),
                content: "body".to_string(),
                tags: vec![],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BlogServiceError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_update_blog_authorization() {
        let f = fixture().await;
        let blog = f.service.create_blog(blog_input(ALICE, "Original")).await.unwrap();

        let input = UpdateBlogInput {
            title: Some("Hijacked".to_string()),
            ..Default::default()
        };
        let err = f
            .service
            .update_blog(blog.id, BOB, input.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, BlogServiceError::Unauthorized));

        // Author and admin both succeed
        let updated = f
            .service
            .update_blog(blog.id, ALICE, input)
            .await
            .unwrap();
        assert_eq!(updated.title, "Hijacked");

        let input = UpdateBlogInput {
            title: Some("Moderated".to_string()),
            ..Default::default()
        };
        let updated = f.service.update_blog(blog.id, ADMIN, input).await.unwrap();
        assert_eq!(updated.title, "Moderated");
        f.service.tasks().wait_idle().await;
    }

    #[tokio::test]
    async fn test_update_blog_invalidates_detail_key() {
        let f = fixture().await;
        let blog = f.service.create_blog(blog_input(ALICE, "Before")).await.unwrap();
        f.service.tasks().wait_idle().await;

        // Populate the detail key, then mutate
        f.service.get_blog(blog.id).await.unwrap();
        f.service.tasks().wait_idle().await;

        f.service
            .update_blog(
                blog.id,
                ALICE,
                UpdateBlogInput {
                    title: Some("After".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        f.service.tasks().wait_idle().await;

        let fetched = f.service.get_blog(blog.id).await.unwrap();
        assert_eq!(fetched.title, "After");
        f.service.tasks().wait_idle().await;
    }

    #[tokio::test]
    async fn test_delete_blog_then_read_is_not_found() {
        let f = fixture().await;
        let blog = f.service.create_blog(blog_input(ALICE, "Doomed")).await.unwrap();
        f.service.get_blog(blog.id).await.unwrap();
        f.service.tasks().wait_idle().await;

        f.service.delete_blog(blog.id, ALICE).await.unwrap();
        f.service.tasks().wait_idle().await;

        let err = f.service.get_blog(blog.id).await.unwrap_err();
        assert!(matches!(err, BlogServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_add_comment_bumps_count_and_invalidates() {
        let f = fixture().await;
        let blog = f.service.create_blog(blog_input(ALICE, "Discussed")).await.unwrap();

        // Warm the comment list cache with the empty state
        assert!(f.service.get_comments(blog.id).await.unwrap().is_empty());

        f.service
            .add_comment(comment_input(blog.id, BOB, "Nice post"))
            .await
            .unwrap();
        f.service.tasks().wait_idle().await;

        let comments = f.service.get_comments(blog.id).await.unwrap();
        assert_eq!(comments.len(), 1);

        let stored = f.blogs.get_by_id(blog.id).await.unwrap().unwrap();
        assert_eq!(stored.comment_count, 1);
    }

    #[tokio::test]
    async fn test_add_comment_to_missing_blog() {
        let f = fixture().await;
        let err = f
            .service
            .add_comment(comment_input(999, BOB, "Hello?"))
            .await
            .unwrap_err();
        assert!(matches!(err, BlogServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_remove_comment_authorization_and_count() {
        let f = fixture().await;
        let blog = f.service.create_blog(blog_input(ALICE, "Moderated")).await.unwrap();
        let comment = f
            .service
            .add_comment(comment_input(blog.id, BOB, "spam"))
            .await
            .unwrap();
        f.service.tasks().wait_idle().await;

        // Alice is the blog author but not the comment author or admin
        let err = f
            .service
            .remove_comment(comment.id, ALICE)
            .await
            .unwrap_err();
        assert!(matches!(err, BlogServiceError::Unauthorized));

        f.service.remove_comment(comment.id, ADMIN).await.unwrap();
        f.service.tasks().wait_idle().await;

        let stored = f.blogs.get_by_id(blog.id).await.unwrap().unwrap();
        assert_eq!(stored.comment_count, 0);
        assert!(f.service.get_comments(blog.id).await.unwrap().is_empty());
    }

    // ------------------------------------------------------------------
    // Reactions
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_reaction_lifecycle() {
        let f = fixture().await;
        let blog = f.service.create_blog(blog_input(ALICE, "Reacted")).await.unwrap();

        f.service
            .add_reaction(blog.id, BOB, ReactionType::Like)
            .await
            .unwrap();

        let stored = f.blogs.get_by_id(blog.id).await.unwrap().unwrap();
        assert_eq!(stored.like_count, 1);
        assert_eq!(stored.dislike_count, 0);

        // Same-type re-add is rejected and changes nothing
        let err = f
            .service
            .add_reaction(blog.id, BOB, ReactionType::Like)
            .await
            .unwrap_err();
        assert!(matches!(err, BlogServiceError::DuplicateReaction));

        let stored = f.blogs.get_by_id(blog.id).await.unwrap().unwrap();
        assert_eq!(stored.like_count, 1);

        f.service.remove_reaction(blog.id, BOB).await.unwrap();
        let stored = f.blogs.get_by_id(blog.id).await.unwrap().unwrap();
        assert_eq!(stored.like_count, 0);
        f.service.tasks().wait_idle().await;
    }

    #[tokio::test]
    async fn test_reaction_flip_adjusts_both_counters() {
        let f = fixture().await;
        let blog = f.service.create_blog(blog_input(ALICE, "Divisive")).await.unwrap();

        f.service
            .add_reaction(blog.id, BOB, ReactionType::Like)
            .await
            .unwrap();
        f.service
            .add_reaction(blog.id, BOB, ReactionType::Dislike)
            .await
            .unwrap();

        let stored = f.blogs.get_by_id(blog.id).await.unwrap().unwrap();
        assert_eq!(stored.like_count, 0);
        assert_eq!(stored.dislike_count, 1);
        f.service.tasks().wait_idle().await;
    }

    #[tokio::test]
    async fn test_remove_reaction_clears_whichever_type_is_held() {
        let f = fixture().await;
        let blog = f.service.create_blog(blog_input(ALICE, "Typed")).await.unwrap();

        f.service
            .add_reaction(blog.id, BOB, ReactionType::Dislike)
            .await
            .unwrap();

        // The caller does not know the held type; removal is keyed on
        // (blog, user) alone and decrements the matching counter.
        f.service.remove_reaction(blog.id, BOB).await.unwrap();

        let stored = f.blogs.get_by_id(blog.id).await.unwrap().unwrap();
        assert_eq!(stored.dislike_count, 0);
        assert_eq!(stored.like_count, 0);
        f.service.tasks().wait_idle().await;
    }

    #[tokio::test]
    async fn test_remove_reaction_twice_is_rejected() {
        let f = fixture().await;
        let blog = f.service.create_blog(blog_input(ALICE, "Once")).await.unwrap();

        f.service
            .add_reaction(blog.id, BOB, ReactionType::Like)
            .await
            .unwrap();
        f.service.remove_reaction(blog.id, BOB).await.unwrap();

        let err = f.service.remove_reaction(blog.id, BOB).await.unwrap_err();
        assert!(matches!(err, BlogServiceError::ReactionNotFound));
        f.service.tasks().wait_idle().await;
    }

    #[tokio::test]
    async fn test_concurrent_same_reaction_stores_one() {
        let f = fixture().await;
        let blog = f.service.create_blog(blog_input(ALICE, "Raced")).await.unwrap();

        let (a, b) = tokio::join!(
            f.service.add_reaction(blog.id, BOB, ReactionType::Like),
            f.service.add_reaction(blog.id, BOB, ReactionType::Like),
        );

        let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1, "exactly one concurrent add may win");
        for result in [a, b] {
            if let Err(e) = result {
                assert!(matches!(e, BlogServiceError::DuplicateReaction));
            }
        }

        let stored = f.blogs.get_by_id(blog.id).await.unwrap().unwrap();
        assert_eq!(stored.like_count, 1);
        f.service.tasks().wait_idle().await;
    }

    // ------------------------------------------------------------------
    // History and recommendations
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_read_history_feeds_recommendations() {
        let f = fixture().await;

        let read = f.service.create_blog(blog_input(BOB, "Read me")).await.unwrap();
        let fresh = f.service.create_blog(blog_input(BOB, "Next up")).await.unwrap();
        f.service.tasks().wait_idle().await;

        f.service.add_read_history(ALICE, read.id).await.unwrap();

        let history = f.service.get_read_history(ALICE, 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].blog_id, read.id);

        let recs = f.service.get_recommendations(ALICE).await.unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].id, fresh.id);
    }

    #[tokio::test]
    async fn test_recommendations_empty_without_history() {
        let f = fixture().await;
        f.service.create_blog(blog_input(BOB, "Unseen")).await.unwrap();
        f.service.tasks().wait_idle().await;

        let recs = f.service.get_recommendations(ALICE).await.unwrap();
        assert!(recs.is_empty());
    }

    #[tokio::test]
    async fn test_is_blog_author_and_comment_author() {
        let f = fixture().await;
        let blog = f.service.create_blog(blog_input(ALICE, "Owned")).await.unwrap();
        let comment = f
            .service
            .add_comment(comment_input(blog.id, BOB, "hi"))
            .await
            .unwrap();
        f.service.tasks().wait_idle().await;

        assert!(f.service.is_blog_author(blog.id, ALICE).await.unwrap());
        assert!(!f.service.is_blog_author(blog.id, BOB).await.unwrap());
        assert!(f.service.is_comment_author(comment.id, BOB).await.unwrap());
        assert!(!f.service.is_comment_author(comment.id, ALICE).await.unwrap());
    }

    // ------------------------------------------------------------------
    // Reaction state machine property
    // ------------------------------------------------------------------

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone, Copy)]
        enum Op {
            Add(ReactionType),
            Remove,
        }

        fn op_strategy() -> impl Strategy<Value = Op> {
            prop_oneof![
                Just(Op::Add(ReactionType::Like)),
                Just(Op::Add(ReactionType::Dislike)),
                Just(Op::Remove),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(16))]

            /// Any sequence of add/remove operations by one user keeps
            /// the stored counters equal to a simple reference model,
            /// and rejected operations change nothing.
            #[test]
            fn reaction_sequences_track_model(ops in proptest::collection::vec(op_strategy(), 1..12)) {
                let rt = tokio::runtime::Runtime::new().unwrap();
                rt.block_on(async {
                    let f = fixture().await;
                    let blog = f.service.create_blog(blog_input(ALICE, "Model")).await.unwrap();

                    // Reference model: the user's current reaction
                    let mut held: Option<ReactionType> = None;

                    for op in ops {
                        match op {
                            Op::Add(t) => {
                                let result = f.service.add_reaction(blog.id, BOB, t).await;
                                match held {
                                    Some(h) if h == t => {
                                        prop_assert!(matches!(
                                            result,
                                            Err(BlogServiceError::DuplicateReaction)
                                        ));
                                    }
                                    _ => {
                                        prop_assert!(result.is_ok());
                                        held = Some(t);
                                    }
                                }
                            }
                            Op::Remove => {
                                let result = f.service.remove_reaction(blog.id, BOB).await;
                                match held {
                                    Some(_) => {
                                        prop_assert!(result.is_ok());
                                        held = None;
                                    }
                                    None => {
                                        prop_assert!(matches!(
                                            result,
                                            Err(BlogServiceError::ReactionNotFound)
                                        ));
                                    }
                                }
                            }
                        }
                    }

                    let stored = f.blogs.get_by_id(blog.id).await.unwrap().unwrap();
                    let (want_like, want_dislike) = match held {
                        Some(ReactionType::Like) => (1, 0),
                        Some(ReactionType::Dislike) => (0, 1),
                        None => (0, 0),
                    };
                    prop_assert_eq!(stored.like_count, want_like);
                    prop_assert_eq!(stored.dislike_count, want_dislike);

                    f.service.tasks().wait_idle().await;
                    Ok(())
                })?;
            }
        }
    }
}
