use crate::scores::ScoreBook;
use crate::storage_utils::AsyncStorageManager;
use anyhow::Result;
use clap::ValueEnum;
use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ContentArrangement, Table, modifiers::UTF8_ROUND_CORNERS,
    presets::UTF8_BORDERS_ONLY,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Tab {
    #[default]
    Streak,
    Score,
}

impl Tab {
    pub fn toggle(self) -> Self {
        match self {
            Tab::Streak => Tab::Score,
            Tab::Score => Tab::Streak,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Tab::Streak => "Best Streak",
            Tab::Score => "Total Correct",
        }
    }
}

struct MockLeader {
    name: &'static str,
    streak: u32,
    score: u32,
}

const MOCK_LEADERS: &[MockLeader] = &[
    MockLeader {
        name: "Warren B.",
        streak: 42,
        score: 156,
    },
    MockLeader {
        name: "Rakesh J.",
        streak: 38,
        score: 142,
    },
    MockLeader {
        name: "Nithin K.",
        streak: 35,
        score: 128,
    },
    MockLeader {
        name: "Elon M.",
        streak: 29,
        score: 98,
    },
    MockLeader {
        name: "Peter L.",
        streak: 25,
        score: 115,
    },
];

#[derive(Debug, Clone, PartialEq)]
pub struct LeaderRow {
    pub name: String,
    pub value: u32,
    pub is_player: bool,
}

/// Mock leaders plus the local player's best, highest first.
pub fn ranked(tab: Tab, book: &ScoreBook) -> Vec<LeaderRow> {
    let mut rows: Vec<LeaderRow> = MOCK_LEADERS
        .iter()
        .map(|l| LeaderRow {
            name: l.name.to_string(),
            value: match tab {
                Tab::Streak => l.streak,
                Tab::Score => l.score,
            },
            is_player: false,
        })
        .collect();

    if let Some(name) = &book.player_name {
        rows.push(LeaderRow {
            name: format!("{} (you)", name),
            value: match tab {
                Tab::Streak => book.high_streak,
                Tab::Score => book.high_score,
            },
            is_player: true,
        });
    }

    // Stable sort keeps mock leaders ahead of the player on ties.
    rows.sort_by(|a, b| b.value.cmp(&a.value));
    rows
}

pub fn visibility_ratio(current: f64, top: f64) -> f64 {
    if top <= 0.0 {
        1.0
    } else {
        (0.4 + 0.6 * (current / top)).max(0.4)
    }
}

pub fn leaders_table(tab: Tab, book: &ScoreBook) -> Table {
    let rows = ranked(tab, book);
    let top = rows.first().map_or(1.0, |r| r.value as f64);

    let mut table = Table::new();
    table
        .load_preset(UTF8_BORDERS_ONLY)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Rank").add_attribute(Attribute::Bold),
            Cell::new("Player").add_attribute(Attribute::Bold),
            Cell::new(tab.title())
                .add_attribute(Attribute::Bold)
                .set_alignment(CellAlignment::Right),
        ]);

    for (i, row) in rows.iter().enumerate() {
        let shade = (255.0 * visibility_ratio(row.value as f64, top)) as u8;
        let name_color = if row.is_player {
            Color::Yellow
        } else {
            Color::Rgb {
                r: 0,
                g: shade,
                b: shade,
            }
        };

        let value_color = Color::Rgb {
            r: 0,
            g: shade,
            b: 0,
        };

        table.add_row(vec![
            Cell::new(i + 1).fg(Color::DarkGrey),
            Cell::new(&row.name).fg(name_color),
            Cell::new(row.value)
                .fg(value_color)
                .set_alignment(CellAlignment::Right),
        ]);
    }

    table
}

pub fn recent_table(book: &ScoreBook) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_BORDERS_ONLY)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Date").add_attribute(Attribute::Bold),
            Cell::new("Player").add_attribute(Attribute::Bold),
            Cell::new("Streak").add_attribute(Attribute::Bold),
            Cell::new("Score").add_attribute(Attribute::Bold),
        ]);

    for entry in book.history.iter().take(10) {
        table.add_row(vec![
            Cell::new(entry.date.format("%d-%m-%Y %H:%M"))
                .fg(Color::DarkGrey),
            Cell::new(&entry.name),
            Cell::new(entry.streak).set_alignment(CellAlignment::Right),
            Cell::new(entry.score).set_alignment(CellAlignment::Right),
        ]);
    }

    table
}

pub async fn run(tab: Tab, storage: &AsyncStorageManager) -> Result<()> {
    let book = ScoreBook::load(storage).await?;

    // Not fatal when stdout is not a terminal.
    let _ = clearscreen::clear();

    println!("\nLeaderboard: {}\n{}", tab.title(), leaders_table(tab, &book));

    if book.history.is_empty() {
        println!("\nNo games played yet.");
    } else {
        println!("\nRecent runs\n{}", recent_table(&book));
    }

    Ok(())
}
