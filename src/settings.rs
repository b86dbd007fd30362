use std::fmt;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::Result;

pub const ENV_PREFIX: &str = "DIARY";

/// How the final table is split into output files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GroupingMode {
    Month,
    Week,
    #[default]
    #[serde(rename = "none")]
    #[value(name = "none")]
    Ungrouped,
}

impl GroupingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            GroupingMode::Month => "month",
            GroupingMode::Week => "week",
            GroupingMode::Ungrouped => "none",
        }
    }
}

/// EU reads ambiguous numeric dates day-first, US month-first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
pub enum DateStyle {
    #[default]
    #[serde(rename = "EU", alias = "eu")]
    #[value(name = "EU", alias = "eu")]
    Eu,
    #[serde(rename = "US", alias = "us")]
    #[value(name = "US", alias = "us")]
    Us,
}

impl DateStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            DateStyle::Eu => "EU",
            DateStyle::Us => "US",
        }
    }

    pub fn dayfirst(self) -> bool {
        self == DateStyle::Eu
    }
}

impl fmt::Display for DateStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Xlsx,
    Csv,
    Sqlite,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Xlsx => "xlsx",
            OutputFormat::Csv => "csv",
            OutputFormat::Sqlite => "sqlite",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub grouping_mode: GroupingMode,
    pub date_format_style: DateStyle,
    pub main_folder: PathBuf,
    pub output_folder: PathBuf,
    pub output_format: OutputFormat,
}

/// Values given on the command line; they win over file and environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub grouping_mode: Option<GroupingMode>,
    pub date_format_style: Option<DateStyle>,
    pub main_folder: Option<PathBuf>,
    pub output_folder: Option<PathBuf>,
    pub output_format: Option<OutputFormat>,
}

impl Settings {
    /// Defaults, then the YAML file (if present), then `DIARY_*` variables,
    /// then CLI overrides. Read once at start-up.
    pub fn load(file: &Path, overrides: &Overrides) -> Result<Self> {
        let path_string = |p: &Option<PathBuf>| p.as_ref().map(|p| p.to_string_lossy().into_owned());

        let settings = Config::builder()
            .set_default("grouping_mode", GroupingMode::default().as_str())?
            .set_default("date_format_style", DateStyle::default().as_str())?
            .set_default("main_folder", "example_data")?
            .set_default("output_folder", "output")?
            .set_default("output_format", OutputFormat::default().as_str())?
            .add_source(File::from(file).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .set_override_option("grouping_mode", overrides.grouping_mode.map(GroupingMode::as_str))?
            .set_override_option(
                "date_format_style",
                overrides.date_format_style.map(DateStyle::as_str),
            )?
            .set_override_option("main_folder", path_string(&overrides.main_folder))?
            .set_override_option("output_folder", path_string(&overrides.output_folder))?
            .set_override_option("output_format", overrides.output_format.map(OutputFormat::as_str))?
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn dayfirst(&self) -> bool {
        self.date_format_style.dayfirst()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let s = Settings::load(&dir.path().join("absent.yaml"), &Overrides::default()).unwrap();
        assert_eq!(s.date_format_style, DateStyle::Eu);
        assert!(s.dayfirst());
        assert_eq!(s.output_format, OutputFormat::Xlsx);
        assert_eq!(s.output_folder, PathBuf::from("output"));
    }

    #[test]
    fn yaml_file_then_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "grouping_mode: week\ndate_format_style: US\nmain_folder: diaries\noutput_folder: out\n",
        )
        .unwrap();

        let s = Settings::load(&path, &Overrides::default()).unwrap();
        assert_eq!(s.grouping_mode, GroupingMode::Week);
        assert_eq!(s.date_format_style, DateStyle::Us);
        assert!(!s.dayfirst());
        assert_eq!(s.main_folder, PathBuf::from("diaries"));

        let overrides = Overrides {
            grouping_mode: Some(GroupingMode::Ungrouped),
            output_format: Some(OutputFormat::Sqlite),
            ..Overrides::default()
        };
        let s = Settings::load(&path, &overrides).unwrap();
        assert_eq!(s.grouping_mode, GroupingMode::Ungrouped);
        assert_eq!(s.output_format, OutputFormat::Sqlite);
        assert_eq!(s.output_folder, PathBuf::from("out"));
    }

    #[test]
    fn unknown_grouping_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "grouping_mode: fortnight\n").unwrap();
        assert!(Settings::load(&path, &Overrides::default()).is_err());
    }
}
