use serde::{Deserialize, Serialize};

use crate::ai::AiDifficulty;

/// 高分榜条目。`date` 为 ISO-8601 字符串。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRecord {
    pub name: String,
    pub score: u32,
    pub difficulty: AiDifficulty,
    #[serde(default)]
    pub difficulty_name: String,
    pub date: String,
}

impl ScoreRecord {
    pub fn new(
        name: impl Into<String>,
        score: u32,
        difficulty: AiDifficulty,
        date: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            score,
            difficulty,
            difficulty_name: difficulty.name().to_string(),
            date: date.into(),
        }
    }

    fn same_player(&self, other: &ScoreRecord) -> bool {
        self.name == other.name && self.difficulty == other.difficulty
    }
}

/// 前 N 名，每个（玩家, 难度）只保留最高分；按分数降序，同分按时间新者在前。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighScoreTable {
    entries: Vec<ScoreRecord>,
    capacity: usize,
}

impl HighScoreTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity,
        }
    }

    /// 载入旧数据：补全 `difficultyName`，合并重复键，再排序截断。
    pub fn from_entries(entries: Vec<ScoreRecord>, capacity: usize) -> Self {
        let mut table = Self::new(capacity);
        for mut record in entries {
            if record.difficulty_name.is_empty() {
                record.difficulty_name = record.difficulty.name().to_string();
            }
            table.merge(record);
        }
        table.normalize();
        table
    }

    pub fn entries(&self) -> &[ScoreRecord] {
        &self.entries
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn best_for(&self, name: &str, difficulty: AiDifficulty) -> Option<&ScoreRecord> {
        self.entries
            .iter()
            .find(|entry| entry.name == name && entry.difficulty == difficulty)
    }

    /// 插入或升级一条记录。返回该记录是否最终留在榜上。
    pub fn insert(&mut self, record: ScoreRecord) -> bool {
        self.merge(record.clone());
        self.normalize();
        self.entries.contains(&record)
    }

    fn merge(&mut self, record: ScoreRecord) {
        match self.entries.iter_mut().find(|entry| entry.same_player(&record)) {
            Some(existing) => {
                if record.score > existing.score {
                    *existing = record;
                }
            }
            None => self.entries.push(record),
        }
    }

    fn normalize(&mut self) {
        self.entries.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| b.date.cmp(&a.date))
        });
        self.entries.truncate(self.capacity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, score: u32, difficulty: AiDifficulty, second: u32) -> ScoreRecord {
        ScoreRecord::new(
            name,
            score,
            difficulty,
            format!("2024-05-01T12:00:{second:02}.000Z"),
        )
    }

    #[test]
    fn lower_score_never_downgrades() {
        let mut table = HighScoreTable::new(5);
        table.insert(record("Ann", 5, AiDifficulty::Pro, 1));
        let kept = table.insert(record("Ann", 3, AiDifficulty::Pro, 2));

        assert!(!kept);
        assert_eq!(table.entries().len(), 1);
        assert_eq!(
            table.best_for("Ann", AiDifficulty::Pro).map(|entry| entry.score),
            Some(5)
        );
    }

    #[test]
    fn higher_score_replaces_entry() {
        let mut table = HighScoreTable::new(5);
        table.insert(record("Ann", 2, AiDifficulty::Pro, 1));
        assert!(table.insert(record("Ann", 4, AiDifficulty::Pro, 2)));

        assert_eq!(table.entries().len(), 1);
        assert_eq!(table.entries()[0].score, 4);
        assert_eq!(table.entries()[0].date, "2024-05-01T12:00:02.000Z");
    }

    #[test]
    fn same_name_different_difficulty_are_separate() {
        let mut table = HighScoreTable::new(5);
        table.insert(record("Ann", 2, AiDifficulty::Pro, 1));
        table.insert(record("Ann", 7, AiDifficulty::Beginner, 2));
        assert_eq!(table.entries().len(), 2);
        assert_eq!(table.entries()[0].difficulty, AiDifficulty::Beginner);
    }

    #[test]
    fn keeps_top_five_sorted_by_score_then_recency() {
        let mut table = HighScoreTable::new(5);
        for (i, name) in ["A", "B", "C", "D", "E", "F"].iter().enumerate() {
            table.insert(record(name, (i as u32) % 3 + 1, AiDifficulty::Amateur, i as u32));
        }

        let order: Vec<(&str, u32)> = table
            .entries()
            .iter()
            .map(|entry| (entry.name.as_str(), entry.score))
            .collect();
        // 分数 1,2,3,1,2,3：同分时更新的在前，最旧的 1 分被挤出
        assert_eq!(
            order,
            vec![("F", 3), ("C", 3), ("E", 2), ("B", 2), ("D", 1)]
        );
    }

    #[test]
    fn low_score_on_full_table_does_not_stick() {
        let mut table = HighScoreTable::new(2);
        table.insert(record("A", 5, AiDifficulty::Pro, 1));
        table.insert(record("B", 4, AiDifficulty::Pro, 2));
        assert!(!table.insert(record("C", 1, AiDifficulty::Pro, 3)));
        assert_eq!(table.entries().len(), 2);
    }

    #[test]
    fn serializes_with_page_field_names() {
        let entry = record("Ann", 3, AiDifficulty::Pro, 9);
        let json = serde_json::to_value(&entry).expect("serialize");
        assert_eq!(json["name"], "Ann");
        assert_eq!(json["score"], 3);
        assert_eq!(json["difficulty"], "PRO");
        assert_eq!(json["difficultyName"], "Pro");
        assert_eq!(json["date"], "2024-05-01T12:00:09.000Z");
    }

    #[test]
    fn legacy_entries_are_normalized() {
        let legacy: Vec<ScoreRecord> = serde_json::from_str(
            r#"[
                {"name":"Bo","score":1,"difficulty":"BEGINNER","date":"2024-01-01T00:00:00.000Z"},
                {"name":"Ann","score":4,"difficulty":"PRO","difficultyName":"Pro","date":"2024-01-02T00:00:00.000Z"},
                {"name":"Ann","score":2,"difficulty":"PRO","difficultyName":"Pro","date":"2024-01-03T00:00:00.000Z"}
            ]"#,
        )
        .expect("legacy json should parse");

        let table = HighScoreTable::from_entries(legacy, 5);
        assert_eq!(table.entries().len(), 2);
        assert_eq!(table.entries()[0].name, "Ann");
        assert_eq!(table.entries()[0].score, 4);
        assert_eq!(table.entries()[1].difficulty_name, "Beginner");
    }
}
