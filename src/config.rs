use thiserror::Error;

/// 設定読み込みのエラー
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 割引率が0〜100の範囲外
    #[error("{0} discount percentage must be between 0 and 100")]
    DiscountOutOfRange(&'static str),

    /// 環境変数の値がパースできない
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// 料金設定
///
/// 延滞料金の日額と、利用者カテゴリごとの割引パーセンテージ。
/// グローバル状態ではなく、この値をワークフロー・レポーティングへ
/// 明示的に渡す。
#[derive(Debug, Clone, Copy)]
pub struct CostConfig {
    /// 延滞1日あたりの料金
    pub overdue_fine: f64,
    pub student_discount_percent: f64,
    pub teacher_discount_percent: f64,
}

impl CostConfig {
    /// 料金設定を構築する
    ///
    /// 割引パーセンテージは0〜100の範囲であること。範囲外は設定
    /// エラーとして起動時に拒否する。
    pub fn new(
        overdue_fine: f64,
        student_discount_percent: f64,
        teacher_discount_percent: f64,
    ) -> Result<Self, ConfigError> {
        if !(0.0..=100.0).contains(&student_discount_percent) {
            return Err(ConfigError::DiscountOutOfRange("student"));
        }
        if !(0.0..=100.0).contains(&teacher_discount_percent) {
            return Err(ConfigError::DiscountOutOfRange("teacher"));
        }

        Ok(Self {
            overdue_fine,
            student_discount_percent,
            teacher_discount_percent,
        })
    }
}

/// アプリケーション設定
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub cost: CostConfig,
}

impl Config {
    /// 環境変数から設定を読み込む
    ///
    /// 未設定の変数は開発向けのデフォルト値になる。
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = parse_env("PORT", 3000_u16)?;
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/library".to_string());

        let overdue_fine = parse_env("OVERDUE_FINE", 1.5_f64)?;
        let student_discount = parse_env("STUDENT_DISCOUNT_PERCENT", 10.0_f64)?;
        let teacher_discount = parse_env("TEACHER_DISCOUNT_PERCENT", 15.0_f64)?;

        Ok(Self {
            port,
            database_url,
            cost: CostConfig::new(overdue_fine, student_discount, teacher_discount)?,
        })
    }
}

fn parse_env<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        Err(_) => Ok(default),
    }
}
