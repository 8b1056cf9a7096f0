//! Schema evolution walkthrough.
//!
//! Stores a record type, then evolves it three times and prints the
//! migration report for each step:
//!
//! 1. a new optional field is appended in place;
//! 2. an integer field becomes a float (table rebuilt, values kept);
//! 3. a required field is added (table recreated empty).
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=rowmap_sqlite=debug cargo run -p rowmap-demos --example migration_walkthrough
//! ```

use rowmap_core::{Record, describe};
use rowmap_sqlite::{MigrationReport, Store};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

mod v1 {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Book {
        pub isbn: String,
        pub title: String,
        pub pages: u32,
    }
}

mod v2 {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Book {
        pub isbn: String,
        pub title: String,
        pub pages: u32,
        pub subtitle: Option<String>,
    }
}

mod v3 {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Book {
        pub isbn: String,
        pub title: String,
        pub pages: f64,
        pub subtitle: Option<String>,
    }
}

mod v4 {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Book {
        pub isbn: String,
        pub title: String,
        pub pages: f64,
        pub subtitle: Option<String>,
        pub edition: u16,
    }
}

macro_rules! book_record {
    ($($module:ident),*) => {
        $(
            impl Record for $module::Book {
                type Key = String;
                const PRIMARY_KEY: &'static str = "isbn";
                fn primary_key(&self) -> &String {
                    &self.isbn
                }
            }
        )*
    };
}

book_record!(v1, v2, v3, v4);

fn print_report(label: &str, report: &MigrationReport) {
    println!("\n=== {label} ===");
    println!("{}", serde_json::to_string_pretty(report).unwrap());
    println!(
        "noop={} destructive={}",
        report.is_noop(),
        report.is_destructive()
    );
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let dir = std::env::temp_dir().join(format!("rowmap-walkthrough-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    let store = Store::open(dir.join("books.db"));
    let mut session = store.session().unwrap();

    // === Step 1: Initial shape ===
    let shape = describe::<v1::Book>().unwrap();
    println!("=== Shape ===");
    println!("{}", serde_json::to_string_pretty(&shape).unwrap());

    session
        .insert(&[
            v1::Book {
                isbn: "978-0131103627".into(),
                title: "The C Programming Language".into(),
                pages: 272,
            },
            v1::Book {
                isbn: "978-1593278281".into(),
                title: "The Rust Programming Language".into(),
                pages: 560,
            },
        ])
        .unwrap();
    println!("\nStored {} books", session.get_all::<v1::Book>().unwrap().len());

    // === Step 2: Optional field ===
    let report = session.reconcile::<v2::Book>().unwrap();
    print_report("Add optional subtitle", &report);
    let book: v2::Book = session.get("978-1593278281").unwrap().unwrap();
    println!("{book:?}");

    // === Step 3: Integer -> float ===
    let report = session.reconcile::<v3::Book>().unwrap();
    print_report("Widen pages to f64", &report);
    for book in session.get_all::<v3::Book>().unwrap() {
        println!("{} has {} pages", book.title, book.pages);
    }

    // === Step 4: Required field ===
    let report = session.reconcile::<v4::Book>().unwrap();
    print_report("Add required edition", &report);
    println!(
        "Books after reset: {}",
        session.get_all::<v4::Book>().unwrap().len()
    );

    // === Cleanup ===
    drop(session);
    std::fs::remove_dir_all(&dir).unwrap();
    println!("\nCleaned up {}", dir.display());
}
