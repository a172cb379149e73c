#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::database::entity::{post, user};
    use crate::database::postgres_repo::{
        PostgresFollowRepository, PostgresPostRepository, PostgresUserRepository,
    };
    use scribe_core::domain::Post;
    use scribe_core::pagination::PageRequest;
    use scribe_core::ports::{BaseRepository, FollowRepository, PostRepository, UserRepository};
    use scribe_core::error::RepoError;
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase, MockExecResult, RuntimeErr, Value};

    fn post_model(author_id: uuid::Uuid, text: &str) -> post::Model {
        post::Model {
            id: uuid::Uuid::new_v4(),
            author_id,
            group_id: None,
            text: text.to_owned(),
            image: None,
            pub_date: chrono::Utc::now().into(),
        }
    }

    fn count_row(n: i64) -> BTreeMap<&'static str, Value> {
        BTreeMap::from([("num_items", Value::BigInt(Some(n)))])
    }

    #[tokio::test]
    async fn test_find_post_by_id() {
        let author_id = uuid::Uuid::new_v4();
        let model = post_model(author_id, "Тестовый пост");
        let post_id = model.id;

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![model]])
            .into_connection();

        let repo = PostgresPostRepository::new(db);

        let result: Option<Post> = repo.find_by_id(post_id).await.unwrap();

        let post = result.unwrap();
        assert_eq!(post.text, "Тестовый пост");
        assert_eq!(post.id, post_id);
        assert_eq!(post.author_id, author_id);
    }

    #[tokio::test]
    async fn test_find_user_by_username() {
        let now = chrono::Utc::now();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![user::Model {
                id: uuid::Uuid::new_v4(),
                username: "leo".to_owned(),
                email: None,
                first_name: "Лев".to_owned(),
                last_name: "Толстой".to_owned(),
                password_hash: "hash".to_owned(),
                created_at: now.into(),
                updated_at: now.into(),
            }]])
            .into_connection();

        let repo = PostgresUserRepository::new(db);

        let user = repo.find_by_username("leo").await.unwrap().unwrap();
        assert_eq!(user.full_name(), "Лев Толстой");
    }

    #[tokio::test]
    async fn test_page_by_author_clamps_to_last_page() {
        let author_id = uuid::Uuid::new_v4();
        let tail: Vec<post::Model> = (0..3)
            .map(|i| post_model(author_id, &format!("post {i}")))
            .collect();

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![count_row(13)]])
            .append_query_results(vec![tail])
            .into_connection();

        let repo = PostgresPostRepository::new(db);

        let page = repo
            .page_by_author(author_id, PageRequest::new(7, 10))
            .await
            .unwrap();

        assert_eq!(page.number, 2);
        assert_eq!(page.num_pages, 2);
        assert_eq!(page.total, 13);
        assert_eq!(page.len(), 3);
        assert!(page.has_previous());
        assert!(!page.has_next());
    }

    #[tokio::test]
    async fn test_follow_feed_uses_subquery() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![count_row(0)]])
            .append_query_results(vec![Vec::<post::Model>::new()])
            .into_connection();

        let repo = PostgresPostRepository::new(db);

        let page = repo
            .page_followed_by(uuid::Uuid::new_v4(), PageRequest::first(10))
            .await
            .unwrap();
        assert!(page.is_empty());
        assert_eq!(page.num_pages, 1);

        let log = format!("{:?}", repo.db.into_transaction_log());
        assert!(log.contains("IN (SELECT"));
    }

    #[tokio::test]
    async fn test_follow_reports_whether_edge_was_created() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results(vec![
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                },
            ])
            .into_connection();

        let repo = PostgresFollowRepository::new(db);
        let (user_id, author_id) = (uuid::Uuid::new_v4(), uuid::Uuid::new_v4());

        assert!(repo.follow(user_id, author_id).await.unwrap());
        assert!(!repo.follow(user_id, author_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_lost_connection_is_a_connection_error() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_errors(vec![DbErr::Conn(RuntimeErr::Internal(
                "connection refused".to_owned(),
            ))])
            .into_connection();

        let repo = PostgresPostRepository::new(db);

        let result: Result<Option<Post>, RepoError> =
            repo.find_by_id(uuid::Uuid::new_v4()).await;
        assert!(matches!(result, Err(RepoError::Connection(_))));
    }
}
