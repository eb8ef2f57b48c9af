use emoji_quiz_back::dao::content::{
    ContentError, ContentSource,
    models::CategoryType,
    movie_db::MovieDatabase,
};

#[tokio::test]
async fn bundled_database_serves_every_category() {
    let db = MovieDatabase::load("data/sample.json").unwrap();

    let directors = db.random_categories(3, CategoryType::Director).await.unwrap();
    assert_eq!(directors.len(), 3);
    assert!(directors.iter().all(|c| c.kind == CategoryType::Director));

    let genres = db.random_categories(100, CategoryType::Genre).await.unwrap();
    assert_eq!(genres.len(), 7);
    for genre in genres {
        let answer = db.random_answer_for_category(genre.id.clone()).await.unwrap();
        assert!(answer.categories.iter().any(|c| c.id == genre.id));
    }
}

#[test]
fn load_errors_name_the_file() {
    let missing = MovieDatabase::load("data/missing.json").unwrap_err();
    assert!(matches!(&missing, ContentError::Read { path, .. } if path == "data/missing.json"));
    assert_eq!(
        missing.to_string(),
        "failed to read content database `data/missing.json`"
    );

    let broken = MovieDatabase::load("Cargo.toml").unwrap_err();
    assert!(matches!(&broken, ContentError::Parse { path, .. } if path == "Cargo.toml"));
}
