use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {

    #[error("Could not read table: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid table: {0}")]
    Csv(#[from] csv::Error),

    #[error("Table has no rows")]
    Empty

}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Player {

    #[serde(rename = "FirstName")]
    pub first_name : String,

    #[serde(rename = "LastName")]
    pub last_name : String,

    #[serde(rename = "Hits")]
    pub hits : u32,

    #[serde(rename = "At-Bats")]
    pub at_bats : u32

}

/// Batting records of a set of players, read from a tab-separated file with a
/// header row. Columns other than FirstName, LastName, Hits and At-Bats are ignored.
#[derive(Debug, Clone)]
pub struct BattingTable {
    players : Vec<Player>
}

impl BattingTable {

    pub fn from_path(path : impl AsRef<Path>) -> Result<Self, DataError> {
        let f = std::fs::File::open(path)?;
        Self::from_reader(f)
    }

    pub fn from_reader(rdr : impl Read) -> Result<Self, DataError> {
        let mut csv_rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(rdr);
        let mut players = Vec::new();
        for rec in csv_rdr.deserialize() {
            let player : Player = rec?;
            players.push(player);
        }
        if players.is_empty() {
            return Err(DataError::Empty);
        }
        Ok(Self { players })
    }

    pub fn players(&self) -> &[Player] {
        &self.players[..]
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn hits(&self) -> Vec<u32> {
        self.players.iter().map(|p| p.hits ).collect()
    }

    pub fn at_bats(&self) -> Vec<u32> {
        self.players.iter().map(|p| p.at_bats ).collect()
    }

}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn reads_tab_separated_records() {
        let content = "FirstName\tLastName\tHits\tAt-Bats\tExtra\nRoberto\tClemente\t18\t45\tx\nMax\tAlvis\t7\t45\ty\n";
        let table = BattingTable::from_reader(content.as_bytes()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.hits(), vec![18, 7]);
        assert_eq!(table.at_bats(), vec![45, 45]);
        assert_eq!(table.players()[1].last_name, "Alvis");
    }

    #[test]
    fn rejects_malformed_tables() {
        let missing = "FirstName\tLastName\tHits\nRoberto\tClemente\t18\n";
        assert!(matches!(BattingTable::from_reader(missing.as_bytes()), Err(DataError::Csv(_))));
        let bad_cell = "FirstName\tLastName\tHits\tAt-Bats\nRoberto\tClemente\teighteen\t45\n";
        assert!(matches!(BattingTable::from_reader(bad_cell.as_bytes()), Err(DataError::Csv(_))));
        let empty = "FirstName\tLastName\tHits\tAt-Bats\n";
        assert!(matches!(BattingTable::from_reader(empty.as_bytes()), Err(DataError::Empty)));
    }

}
