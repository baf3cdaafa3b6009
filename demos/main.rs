use schemasync::*;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Entity, Serialize, Deserialize)]
#[table(name = "users")]
pub struct User {
    #[column(primary_key, uuid)]
    pub id: Option<String>,
    pub name: String,
    #[column(unique)]
    pub email: String,
    #[column(name = "createdAt", default = "now")]
    #[serde(rename = "createdAt")]
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Entity, Serialize, Deserialize)]
#[table(name = "posts")]
pub struct Post {
    #[column(primary_key, uuid)]
    pub id: Option<String>,
    #[column(references = "users.id")]
    pub author: String,
    pub title: String,
    pub meta: Option<serde_json::Value>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = DatabaseConfig::from_env()?;
    let orm = Orm::connect(&config, Schema::new(vec![User::descriptor()?, Post::descriptor()?])?).await?;

    let mut events = orm.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            println!("sync event: {:?}", event);
        }
    });
    orm.migrate().await?;

    let users = orm.table::<User>()?;
    let posts = orm.table::<Post>()?;

    let ada = users
        .insert(&User {
            id: None,
            name: "Ada".into(),
            email: "ada@mail.com".into(),
            created_at: None,
        })
        .await?;
    println!("{:?}", ada);

    let author = ada.id.clone().unwrap_or_default();
    posts
        .insert(&Post {
            id: None,
            author: author.clone(),
            title: "Notes on the Analytical Engine".into(),
            meta: Some(json!({"tags": ["history"], "draft": false})),
        })
        .await?;

    let drafts = posts
        .find(Filter::new().eq("author", author.clone()).json_eq("meta", &["draft"], false))
        .await?;
    println!("drafts: {:?}", drafts);

    let renamed = users.update(author.clone(), json!({"name": "Ada Lovelace"})).await?;
    println!("renamed: {:?}", renamed);

    let all_users = users.all().await?;
    println!("All users: {:?}", all_users);

    for post in posts.all().await? {
        if let Some(id) = post.id {
            posts.delete(id).await?;
        }
    }
    orm.raw(r#"DELETE FROM "users" WHERE "id" = $1"#, &[json!(author)]).await?;

    Ok(())
}
