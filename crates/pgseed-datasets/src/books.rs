//! Books, authors and the many-to-many link between them.

use pgseed_core::{Batch, Column, ColumnType, Dataset, EntityDefinition, ForeignKey, Row};

pub const NAME: &str = "books";

pub fn dataset() -> Dataset {
    Dataset::new(
        NAME,
        vec![
            EntityDefinition::new("books")
                .with_column(Column::new("isbn", ColumnType::Text))
                .with_column(Column::new("title", ColumnType::Text))
                .with_column(Column::new("description", ColumnType::Text).nullable())
                .with_primary_key(&["isbn"]),
            EntityDefinition::new("authors")
                .with_column(Column::new("id", ColumnType::Text))
                .with_column(Column::new("name", ColumnType::Text))
                .with_primary_key(&["id"]),
            EntityDefinition::association("book_authors")
                .with_column(Column::new("isbn", ColumnType::Text))
                .with_column(Column::new("author_id", ColumnType::Text))
                .with_primary_key(&["isbn", "author_id"])
                .with_foreign_key(ForeignKey::new("isbn", "books", "isbn"))
                .with_foreign_key(ForeignKey::new("author_id", "authors", "id")),
        ],
    )
}

pub fn fixtures() -> Vec<Batch> {
    vec![
        Batch::new(
            "books",
            vec![
                book(
                    "9785811243570",
                    "Charlie and the chocolate factory",
                    "Willy Wonka's famous chocolate factory is opening at last!",
                ),
                book(
                    "9788374950978",
                    "Kafka on the Shore",
                    "Kafka on the Shore is a 2002 novel by Japanese author Haruki Murakami",
                ),
                book(
                    "9781471331435",
                    "1984",
                    "1984 was George Orwell's chilling prophecy about the dystopian future",
                ),
            ],
        ),
        Batch::new(
            "authors",
            ["Roald Dahl", "Haruki Murakami", "Philip Gabriel", "George Orwell"]
                .into_iter()
                .map(|name| Row::new().with("id", name).with("name", name))
                .collect(),
        ),
        Batch::new(
            "book_authors",
            vec![
                book_author("9785811243570", "Roald Dahl"),
                book_author("9788374950978", "Haruki Murakami"),
                book_author("9788374950978", "Philip Gabriel"),
                book_author("9781471331435", "George Orwell"),
            ],
        ),
    ]
}

fn book(isbn: &str, title: &str, description: &str) -> Row {
    Row::new()
        .with("isbn", isbn)
        .with("title", title)
        .with("description", description)
}

pub fn book_author(isbn: &str, author_id: &str) -> Row {
    Row::new().with("isbn", isbn).with("author_id", author_id)
}
