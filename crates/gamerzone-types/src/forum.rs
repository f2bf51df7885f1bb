use serde::Serialize;

use crate::catalog::GameId;

/// A "game zone" in the sidebar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
    Fps,
    Moba,
    Rpg,
    Sports,
}

#[derive(Debug, Clone, Serialize)]
pub struct Zone {
    pub category: Category,
    pub icon: &'static str,
    pub name: &'static str,
    pub thread_count: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    pub id: u32,
    pub title: &'static str,
    pub author: &'static str,
    pub replies: u32,
    pub views: u32,
    pub last_active: &'static str,
    pub category: Category,
    pub hot: bool,
}

pub static ZONES: [Zone; 4] = [
    Zone { category: Category::Fps, icon: "🎯", name: "FPS Games", thread_count: 156 },
    Zone { category: Category::Moba, icon: "⚔️", name: "MOBA", thread_count: 89 },
    Zone { category: Category::Rpg, icon: "🎮", name: "RPG", thread_count: 234 },
    Zone { category: Category::Sports, icon: "⚽", name: "Sports", thread_count: 67 },
];

pub static THREADS: [Thread; 2] = [
    Thread {
        id: 1,
        title: "Tips Jago Main Valorant",
        author: "ProGamer123",
        replies: 23,
        views: 156,
        last_active: "5 menit yang lalu",
        category: Category::Fps,
        hot: true,
    },
    Thread {
        id: 2,
        title: "Review Mobile Legends Season Terbaru",
        author: "MLBBPro",
        replies: 45,
        views: 230,
        last_active: "10 menit yang lalu",
        category: Category::Moba,
        hot: false,
    },
];

/// Threads shown under the game filter. `None` shows everything.
pub fn threads_for(game: Option<GameId>) -> impl Iterator<Item = &'static Thread> {
    let category = game.map(|g| g.entry().category);
    THREADS
        .iter()
        .filter(move |t| category.is_none_or(|c| t.category == c))
}
