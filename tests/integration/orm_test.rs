// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm::ActiveValue::Set;
use sea_orm::{ColumnTrait, FromQueryResult, RelationTrait, Value};
use std::time::Duration;

use storelayer::infrastructure::database::Session;
use storelayer::infrastructure::observability::{use_orm_telemetry, Instrumentable, TelemetryOptions};

use super::helpers::entities::{post, user};
use super::helpers::{
    assert_invalid_query, create_test_orm, new_post, new_user, seed_user, RecordingHook,
};

#[derive(Debug, FromQueryResult, PartialEq)]
struct UserName {
    name: String,
}

#[tokio::test]
async fn test_first_on_empty_table_is_not_found() {
    let orm = create_test_orm(false).await;

    let result = orm
        .model::<user::Entity>()
        .filter(user::Column::Email.eq("nobody@example.com"))
        .first::<user::Model>()
        .await;

    let err = result.unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {}", err);
}

#[tokio::test]
async fn test_where_select_first_reads_projection() {
    let orm = create_test_orm(false).await;
    seed_user(&orm, "alice@example.com", "Alice", 30).await;
    seed_user(&orm, "bob@example.com", "Bob", 25).await;

    let row: UserName = orm
        .model::<user::Entity>()
        .select([user::Column::Name])
        .filter(user::Column::Age.lt(28))
        .first()
        .await
        .unwrap();
    assert_eq!(row.name, "Bob");

    let count = orm
        .model::<user::Entity>()
        .filter(user::Column::Age.gte(25))
        .count()
        .await
        .unwrap();
    assert_eq!(count, 2);
}

#[tokio::test]
async fn test_first_and_last_follow_primary_key() {
    let orm = create_test_orm(false).await;
    let first_id = seed_user(&orm, "a@example.com", "A", 20).await;
    seed_user(&orm, "b@example.com", "B", 21).await;
    let last_id = seed_user(&orm, "c@example.com", "C", 22).await;

    let first: user::Model = orm.model::<user::Entity>().first().await.unwrap();
    let last: user::Model = orm.model::<user::Entity>().last().await.unwrap();
    assert_eq!(first.id, first_id);
    assert_eq!(last.id, last_id);

    // 调用方的排序优先于主键
    let oldest: user::Model = orm
        .model::<user::Entity>()
        .order_by_desc(user::Column::Age)
        .first()
        .await
        .unwrap();
    assert_eq!(oldest.email, "c@example.com");
}

#[tokio::test]
async fn test_on_conflict_updates_only_listed_columns() {
    let orm = create_test_orm(false).await;
    seed_user(&orm, "alice@example.com", "Alice", 30).await;

    orm.model::<user::Entity>()
        .on_conflict([user::Column::Email], [user::Column::Name])
        .create(new_user("alice@example.com", "Alicia", 99))
        .await
        .unwrap();

    let rows: Vec<user::Model> = orm.model::<user::Entity>().find().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "Alicia");
    assert_eq!(rows[0].age, 30);
}

#[tokio::test]
async fn test_on_conflict_without_updates_ignores_duplicate() {
    let orm = create_test_orm(false).await;
    seed_user(&orm, "alice@example.com", "Alice", 30).await;

    let inserted = orm
        .model::<user::Entity>()
        .on_conflict([user::Column::Email], Vec::<user::Column>::new())
        .create(new_user("alice@example.com", "Other", 1))
        .await
        .unwrap();
    assert_eq!(inserted, 0);

    let alice: user::Model = orm.model::<user::Entity>().first().await.unwrap();
    assert_eq!(alice.name, "Alice");
}

#[tokio::test]
async fn test_duplicate_insert_without_conflict_clause_fails() {
    let orm = create_test_orm(false).await;
    seed_user(&orm, "alice@example.com", "Alice", 30).await;

    let result = orm
        .model::<user::Entity>()
        .create(new_user("alice@example.com", "Again", 31))
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_deferred_errors_surface_on_terminal_call() {
    let orm = create_test_orm(false).await;

    let query = orm
        .model::<user::Entity>()
        .where_raw("age > ? AND age < ?", vec![Value::from(18)])
        .order_by_field(user::Column::Email, Vec::<String>::new());
    assert!(query.error().is_some());
    assert_invalid_query(query.find::<user::Model>().await);

    // 清空后重新构建的查询正常执行
    let rows = orm
        .model::<user::Entity>()
        .where_raw("age > ?", vec![Value::from(18), Value::from(19)])
        .with_timeout(Duration::from_secs(5))
        .find::<user::Model>()
        .await
        .unwrap();
    assert!(rows.is_empty());

    assert_invalid_query(
        orm.model::<user::Entity>()
            .on_conflict(Vec::<user::Column>::new(), [user::Column::Name])
            .create(new_user("x@example.com", "X", 1))
            .await,
    );
    assert_invalid_query(
        orm.model::<user::Entity>()
            .create_many(Vec::<user::ActiveModel>::new())
            .await,
    );
}

#[tokio::test]
async fn test_where_raw_binds_values() {
    let orm = create_test_orm(false).await;
    seed_user(&orm, "a@example.com", "A", 20).await;
    seed_user(&orm, "b@example.com", "B", 40).await;

    let rows: Vec<user::Model> = orm
        .model::<user::Entity>()
        .where_raw("age BETWEEN ? AND ?", vec![30.into(), 50.into()])
        .find()
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].email, "b@example.com");
}

#[tokio::test]
async fn test_order_by_field_uses_given_sequence() {
    let orm = create_test_orm(false).await;
    orm.model::<user::Entity>()
        .create_many(vec![
            new_user("a@example.com", "A", 1),
            new_user("b@example.com", "B", 2),
            new_user("c@example.com", "C", 3),
            new_user("d@example.com", "D", 4),
        ])
        .await
        .unwrap();

    let rows: Vec<user::Model> = orm
        .model::<user::Entity>()
        .order_by_field(
            user::Column::Email,
            ["c@example.com", "a@example.com", "b@example.com"],
        )
        .find()
        .await
        .unwrap();

    let emails: Vec<&str> = rows.iter().map(|r| r.email.as_str()).collect();
    assert_eq!(
        emails,
        vec![
            "c@example.com",
            "a@example.com",
            "b@example.com",
            "d@example.com"
        ]
    );
}

#[tokio::test]
async fn test_offset_and_limit() {
    let orm = create_test_orm(true).await;
    for i in 0..5 {
        seed_user(&orm, &format!("u{}@example.com", i), "U", i).await;
    }

    let rows: Vec<user::Model> = orm
        .model::<user::Entity>()
        .order_by_asc(user::Column::Age)
        .offset(1)
        .limit(2)
        .find()
        .await
        .unwrap();
    let ages: Vec<i32> = rows.iter().map(|r| r.age).collect();
    assert_eq!(ages, vec![1, 2]);
}

#[tokio::test]
async fn test_update_by_primary_key_and_by_filter() {
    let orm = create_test_orm(false).await;
    let id = seed_user(&orm, "alice@example.com", "Alice", 30).await;
    seed_user(&orm, "bob@example.com", "Bob", 30).await;

    let updated = orm
        .model::<user::Entity>()
        .update(user::ActiveModel {
            id: Set(id),
            name: Set("Alicia".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(updated, 1);

    let updated = orm
        .model::<user::Entity>()
        .filter(user::Column::Age.eq(30))
        .update(user::ActiveModel {
            age: Set(31),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(updated, 2);

    let alice: user::Model = orm
        .model::<user::Entity>()
        .filter(user::Column::Id.eq(id))
        .first()
        .await
        .unwrap();
    assert_eq!(alice.name, "Alicia");
    assert_eq!(alice.age, 31);

    // 没有条件也没有主键
    assert_invalid_query(
        orm.model::<user::Entity>()
            .update(user::ActiveModel {
                name: Set("Nobody".to_string()),
                ..Default::default()
            })
            .await,
    );

    // 没有要更新的字段
    let untouched = orm
        .model::<user::Entity>()
        .filter(user::Column::Id.eq(id))
        .update(user::ActiveModel::default())
        .await
        .unwrap();
    assert_eq!(untouched, 0);
}

#[tokio::test]
async fn test_update_columns_and_delete_require_where_clause() {
    let orm = create_test_orm(false).await;
    seed_user(&orm, "alice@example.com", "Alice", 30).await;
    seed_user(&orm, "bob@example.com", "Bob", 40).await;

    assert_invalid_query(
        orm.model::<user::Entity>()
            .update_columns(vec![(user::Column::Age, 1.into())])
            .await,
    );
    assert_invalid_query(orm.model::<user::Entity>().delete().await);

    let changed = orm
        .model::<user::Entity>()
        .filter(user::Column::Email.eq("bob@example.com"))
        .update_columns(vec![
            (user::Column::Age, 41.into()),
            (user::Column::Name, "Robert".into()),
        ])
        .await
        .unwrap();
    assert_eq!(changed, 1);

    let removed = orm
        .model::<user::Entity>()
        .filter(user::Column::Age.lt(35))
        .delete()
        .await
        .unwrap();
    assert_eq!(removed, 1);

    let rest: Vec<user::Model> = orm.model::<user::Entity>().find().await.unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].name, "Robert");
}

#[tokio::test]
async fn test_skip_default_transaction_keeps_write_results() {
    for skip in [false, true] {
        let orm = create_test_orm(skip).await;
        let inserted = orm
            .model::<user::Entity>()
            .create_many(vec![
                new_user("a@example.com", "A", 1),
                new_user("b@example.com", "B", 2),
            ])
            .await
            .unwrap();
        assert_eq!(inserted, 2, "skip_default_transaction={}", skip);

        let removed = orm
            .model::<user::Entity>()
            .filter(user::Column::Age.gt(0))
            .delete()
            .await
            .unwrap();
        assert_eq!(removed, 2, "skip_default_transaction={}", skip);
    }
}

#[tokio::test]
async fn test_transaction_commit_and_rollback() {
    let orm = create_test_orm(false).await;

    let txn = orm.begin().await.unwrap();
    seed_user(&txn, "rolled@example.com", "Rolled", 1).await;
    txn.rollback().await.unwrap();

    let count = orm.model::<user::Entity>().count().await.unwrap();
    assert_eq!(count, 0);

    let txn = orm.begin().await.unwrap();
    let id = seed_user(&txn, "kept@example.com", "Kept", 2).await;
    txn.model::<post::Entity>()
        .create(new_post(id, "hello"))
        .await
        .unwrap();

    // 保存点回滚不影响外层事务
    let nested = txn.begin().await.unwrap();
    nested
        .model::<post::Entity>()
        .create(new_post(id, "discarded"))
        .await
        .unwrap();
    nested.rollback().await.unwrap();

    txn.commit().await.unwrap();

    assert_eq!(orm.model::<user::Entity>().count().await.unwrap(), 1);
    let titles: Vec<post::Model> = orm.model::<post::Entity>().find().await.unwrap();
    assert_eq!(titles.len(), 1);
    assert_eq!(titles[0].title, "hello");
}

#[tokio::test]
async fn test_preload_returns_related_rows() {
    let orm = create_test_orm(false).await;
    let alice = seed_user(&orm, "alice@example.com", "Alice", 30).await;
    let bob = seed_user(&orm, "bob@example.com", "Bob", 40).await;
    orm.model::<post::Entity>()
        .create_many(vec![
            new_post(alice, "first"),
            new_post(alice, "second"),
            new_post(bob, "third"),
        ])
        .await
        .unwrap();

    let users = orm
        .model::<user::Entity>()
        .order_by_asc(user::Column::Id)
        .preload(post::Entity)
        .find()
        .await
        .unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[0].0.id, alice);
    assert_eq!(users[0].1.len(), 2);
    assert_eq!(users[1].1.len(), 1);

    let (user, posts) = orm
        .model::<user::Entity>()
        .filter(user::Column::Id.eq(bob))
        .preload(post::Entity)
        .first()
        .await
        .unwrap();
    assert_eq!(user.name, "Bob");
    assert_eq!(posts[0].title, "third");
}

#[tokio::test]
async fn test_joins_filter_on_related_table_and_omit_assoc() {
    let orm = create_test_orm(false).await;
    let alice = seed_user(&orm, "alice@example.com", "Alice", 30).await;
    seed_user(&orm, "bob@example.com", "Bob", 40).await;
    orm.model::<post::Entity>()
        .create(new_post(alice, "rust"))
        .await
        .unwrap();

    let authors: Vec<user::Model> = orm
        .model::<user::Entity>()
        .joins(user::Relation::Post.def())
        .filter(post::Column::Title.eq("rust"))
        .find()
        .await
        .unwrap();
    assert_eq!(authors.len(), 1);
    assert_eq!(authors[0].id, alice);

    // omit_assoc 只影响写入，连接表上的过滤仍然生效
    let authors: Vec<user::Model> = orm
        .model::<user::Entity>()
        .joins(user::Relation::Post.def())
        .filter(post::Column::Title.eq("rust"))
        .omit_assoc()
        .find()
        .await
        .unwrap();
    assert_eq!(authors.len(), 1);
    assert_eq!(authors[0].id, alice);
}

#[tokio::test]
async fn test_scan_returns_none_without_rows() {
    let orm = create_test_orm(false).await;

    let nobody: Option<UserName> = orm
        .model::<user::Entity>()
        .select(vec![user::Column::Name])
        .scan()
        .await
        .unwrap();
    assert!(nobody.is_none());

    seed_user(&orm, "alice@example.com", "Alice", 30).await;
    let found: Option<UserName> = orm
        .model::<user::Entity>()
        .select(vec![user::Column::Name])
        .filter(user::Column::Age.gt(20))
        .scan()
        .await
        .unwrap();
    assert_eq!(
        found,
        Some(UserName {
            name: "Alice".to_string()
        })
    );

    let none_older: Option<UserName> = orm
        .model::<user::Entity>()
        .select(vec![user::Column::Name])
        .filter(user::Column::Age.gt(99))
        .scan()
        .await
        .unwrap();
    assert!(none_older.is_none());
}

#[tokio::test]
async fn test_where_raw_ignores_question_marks_in_literals() {
    let orm = create_test_orm(false).await;
    seed_user(&orm, "alice@example.com", "Alice", 30).await;
    seed_user(&orm, "bob@example.com", "who?", 40).await;

    let users: Vec<user::Model> = orm
        .model::<user::Entity>()
        .where_raw("name <> 'who?' AND age > ?", vec![20.into()])
        .find()
        .await
        .unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].name, "Alice");

    assert_invalid_query(
        orm.model::<user::Entity>()
            .where_raw("name = 'who?'", vec![20.into()])
            .find::<user::Model>()
            .await,
    );
}

#[tokio::test]
async fn test_raw_and_exec() {
    let orm = create_test_orm(false).await;
    seed_user(&orm, "alice@example.com", "Alice", 30).await;
    seed_user(&orm, "bob@example.com", "Bob", 40).await;

    let affected = orm
        .exec(
            "UPDATE users SET age = ? WHERE email = ?",
            vec![50.into(), "alice@example.com".into()],
        )
        .await
        .unwrap();
    assert_eq!(affected, 1);

    let names: Vec<UserName> = orm
        .raw(
            "SELECT name FROM users WHERE age > ? ORDER BY name",
            vec![35.into()],
        )
        .find()
        .await
        .unwrap();
    assert_eq!(
        names,
        vec![
            UserName {
                name: "Alice".to_string()
            },
            UserName {
                name: "Bob".to_string()
            }
        ]
    );

    let missing = orm
        .raw("SELECT name FROM users WHERE age > ?", vec![100.into()])
        .scan::<UserName>()
        .await
        .unwrap();
    assert!(missing.is_none());

    let oldest = orm
        .raw(
            "SELECT name FROM users WHERE age > ? ORDER BY age DESC",
            vec![35.into()],
        )
        .scan::<UserName>()
        .await
        .unwrap();
    assert_eq!(
        oldest,
        Some(UserName {
            name: "Alice".to_string()
        })
    );
}

#[tokio::test]
async fn test_hooks_observe_operations_and_session_values() {
    let orm = create_test_orm(false).await;
    let hook = RecordingHook::new();
    orm.add_hook(hook.clone());
    assert_eq!(orm.hook_count(), 1);

    let tenant = orm.set("tenant", "acme".to_string());
    assert_eq!(tenant.value::<String>("tenant").map(String::as_str), Some("acme"));
    assert!(orm.value::<String>("tenant").is_none());

    tenant
        .model::<user::Entity>()
        .create(new_user("alice@example.com", "Alice", 30))
        .await
        .unwrap();
    let last = hook.last().unwrap();
    assert_eq!(last.operation, "create");
    assert_eq!(last.table, "users");
    assert_eq!(last.rows_affected, Some(1));
    assert_eq!(last.tenant.as_deref(), Some("acme"));

    orm.model::<user::Entity>()
        .set("tenant", "globex".to_string())
        .filter(user::Column::Id.eq(404))
        .first::<user::Model>()
        .await
        .unwrap_err();
    let last = hook.last().unwrap();
    assert_eq!(last.operation, "first");
    assert!(last.failed);
    assert_eq!(last.tenant.as_deref(), Some("globex"));

    orm.exec("DELETE FROM users", Vec::new()).await.unwrap();
    assert_eq!(hook.operations(), vec!["create", "first", "exec"]);
}

#[tokio::test]
async fn test_orm_telemetry_attaches_tracing_hook() {
    let orm = create_test_orm(false).await;
    use_orm_telemetry(
        &orm,
        TelemetryOptions::new()
            .without_metrics()
            .with_db_name("test")
            .without_query_variables(),
    );
    assert_eq!(orm.hook_count(), 1);

    // 派生句柄共享钩子列表
    let derived = orm.with_timeout(Duration::from_secs(1));
    assert_eq!(derived.hook_count(), 1);
    derived.ping().await.unwrap();

    orm.close().await.unwrap();
}
