use moneta::cli::invest::InvestCommand;
use moneta::cli::ledger::{AccountCommand, CategoryCommand, PeriodArgs, StatsCommand, TxCommand, TxFields};
use moneta::cli::salary::SalaryCommand;
use moneta::core::config::AppConfig;
use moneta::core::models::{InvestmentInput, TransactionType};
use moneta::{App, AppCommand};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::info;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod test_utils {
    use super::*;

    /// Writes a config pointing both providers at mock servers, with every delay zeroed.
    pub fn write_config(dir: &Path, status_invest: &str, yahoo: &str) -> PathBuf {
        let config_path = dir.join("config.yaml");
        let config_content = format!(
            r#"
database_path: "{}"
providers:
  status_invest:
    base_url: "{status_invest}"
  yahoo:
    base_url: "{yahoo}"
    retry_delay_ms: 0
sync:
  provider_delay_ms: 0
  refresh_retry_delay_ms: 0
  storage_backoff_ms: 0
  ticker_delay_ms: 0
  auto_ticker_delay_ms: 0
  http_timeout_secs: 5
"#,
            dir.join("moneta.sqlite").display()
        );
        fs::write(&config_path, config_content).expect("Failed to write config file");
        config_path
    }

    pub async fn mount_status_invest(server: &MockServer, ticker: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path("/home/mainsearchquery"))
            .and(query_param("q", ticker))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    pub async fn mount_yahoo(server: &MockServer, symbol: &str, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(format!("/v8/finance/chart/{symbol}")))
            .respond_with(response)
            .mount(server)
            .await;
    }

    pub fn app(config_path: &Path) -> App {
        let config = AppConfig::load_from_path(config_path).expect("Failed to load config");
        App::from_config(config).expect("Failed to build app")
    }

    pub fn input(ticker: &str, quantity: Decimal, price: Decimal) -> InvestmentInput {
        InvestmentInput {
            ticker: ticker.to_string(),
            name: String::new(),
            r#type: "stock".to_string(),
            quantity,
            average_price: price,
            notes: None,
            current_price: None,
        }
    }
}

async fn run(command: AppCommand, config_path: &Path) {
    let result = moneta::run_command(command, Some(config_path.to_str().unwrap())).await;
    assert!(result.is_ok(), "Command failed with: {:?}", result.err());
}

#[test_log::test(tokio::test)]
async fn test_salary_and_purchase_flow_keeps_balances() {
    let dir = TempDir::new().unwrap();
    let status_invest = MockServer::start().await;
    let yahoo = MockServer::start().await;
    let config_path = test_utils::write_config(dir.path(), &status_invest.uri(), &yahoo.uri());

    run(
        AppCommand::Account(AccountCommand::Add {
            name: "Checking".to_string(),
            kind: "checking".to_string(),
            color: None,
        }),
        &config_path,
    )
    .await;
    run(
        AppCommand::Salary(SalaryCommand::Set {
            amount: dec!(5000),
            account: 1,
            category: Some("Salary".to_string()),
        }),
        &config_path,
    )
    .await;
    run(AppCommand::Salary(SalaryCommand::Pay), &config_path).await;
    run(
        AppCommand::Tx(TxCommand::Add(TxFields {
            account: 1,
            kind: TransactionType::Expense,
            amount: dec!(150.25),
            category: Some("Food".to_string()),
            description: Some("Groceries".to_string()),
            date: None,
        })),
        &config_path,
    )
    .await;
    run(
        AppCommand::Invest(InvestCommand::Add {
            ticker: "petr4".to_string(),
            quantity: dec!(10),
            average_price: dec!(20),
            name: Some("Petrobras".to_string()),
            kind: "stock".to_string(),
            notes: None,
            fetch_price: false,
        }),
        &config_path,
    )
    .await;

    let app = test_utils::app(&config_path);
    let account = app
        .store
        .with_conn(|c| moneta::store::accounts::get(c, 1))
        .unwrap();
    info!(balance = %account.balance, "Balance after flow");
    assert_eq!(account.balance, dec!(4649.75));
    assert_eq!(app.ledger.balance_drift(1).unwrap(), dec!(0));

    let investments = app.investments.list().unwrap();
    assert_eq!(investments.len(), 1);
    assert_eq!(investments[0].ticker, "PETR4");
    assert!(investments[0].ledger_transaction_id.is_some());

    run(
        AppCommand::Invest(InvestCommand::Rm {
            id: investments[0].id,
        }),
        &config_path,
    )
    .await;
    let account = app
        .store
        .with_conn(|c| moneta::store::accounts::get(c, 1))
        .unwrap();
    assert_eq!(account.balance, dec!(4849.75));
}

#[test_log::test(tokio::test)]
async fn test_bulk_refresh_isolates_failed_ticker() {
    let dir = TempDir::new().unwrap();
    let status_invest = MockServer::start().await;
    let yahoo = MockServer::start().await;
    test_utils::mount_status_invest(
        &status_invest,
        "PETR4",
        r#"[{"code": "PETR4", "nameFormated": "Petrobras PN", "type": 1, "price": "38,45"}]"#,
    )
    .await;
    test_utils::mount_status_invest(&status_invest, "XXXX3", "[]").await;
    test_utils::mount_yahoo(&yahoo, "XXXX3.SA", ResponseTemplate::new(404)).await;
    let config_path = test_utils::write_config(dir.path(), &status_invest.uri(), &yahoo.uri());

    let app = test_utils::app(&config_path);
    app.store
        .with_conn(|c| moneta::store::accounts::insert(c, "Broker", "checking", None))
        .unwrap();
    let petr = app
        .investments
        .create(test_utils::input("PETR4", dec!(10), dec!(20)))
        .unwrap();
    let unknown = app
        .investments
        .create(test_utils::input("XXXX3", dec!(5), dec!(10)))
        .unwrap();

    let summary = app.sync.refresh_all().await.unwrap();
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.errors[0].ticker, "XXXX3");

    let petr = app.investments.get(petr.id).unwrap();
    assert_eq!(petr.current_price, Some(dec!(38.45)));
    assert_eq!(petr.current_value, Some(dec!(384.5)));
    assert_eq!(petr.profit_loss, Some(dec!(184.5)));
    let unknown = app.investments.get(unknown.id).unwrap();
    assert_eq!(unknown.current_price, None);

    run(AppCommand::Refresh { ticker: None }, &config_path).await;
}

#[test_log::test(tokio::test)]
async fn test_refresh_one_falls_back_to_second_provider() {
    let dir = TempDir::new().unwrap();
    let status_invest = MockServer::start().await;
    let yahoo = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/home/mainsearchquery"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&status_invest)
        .await;
    test_utils::mount_yahoo(
        &yahoo,
        "VALE3.SA",
        ResponseTemplate::new(200)
            .set_body_string(r#"{"chart": {"result": [{"meta": {"regularMarketPrice": 61.2}}]}}"#),
    )
    .await;
    let config_path = test_utils::write_config(dir.path(), &status_invest.uri(), &yahoo.uri());

    let app = test_utils::app(&config_path);
    app.investments
        .create(test_utils::input("VALE3", dec!(2), dec!(50)))
        .unwrap();

    let refreshed = app.sync.refresh_one("vale3").await.unwrap();
    assert_eq!(refreshed.len(), 1);
    assert_eq!(refreshed[0].current_price, Some(dec!(61.2)));
    assert_eq!(refreshed[0].current_value, Some(dec!(122.4)));

    let quote = app.sync.quote("VALE3").await.unwrap();
    assert_eq!(quote.source, "YAHOO");
}

#[test_log::test(tokio::test)]
async fn test_search_and_stats_commands() {
    let dir = TempDir::new().unwrap();
    let status_invest = MockServer::start().await;
    let yahoo = MockServer::start().await;
    test_utils::mount_status_invest(
        &status_invest,
        "itau",
        r#"[{"code": "ITUB4", "nameFormated": "Itau Unibanco", "type": 1, "price": "33,10"},
            {"code": "ITSA4", "nameFormated": "Itausa", "type": 1, "price": "10,02"}]"#,
    )
    .await;
    let config_path = test_utils::write_config(dir.path(), &status_invest.uri(), &yahoo.uri());

    run(
        AppCommand::Search {
            query: "itau".to_string(),
        },
        &config_path,
    )
    .await;
    run(
        AppCommand::Tx(TxCommand::Stats(StatsCommand::Month { month: None })),
        &config_path,
    )
    .await;

    let result = moneta::run_command(
        AppCommand::Tx(TxCommand::Stats(StatsCommand::Month {
            month: Some("2025-13".to_string()),
        })),
        Some(config_path.to_str().unwrap()),
    )
    .await;
    assert!(result.is_err());
}

#[test_log::test(tokio::test)]
async fn test_category_and_reports_commands() {
    let dir = TempDir::new().unwrap();
    let status_invest = MockServer::start().await;
    let yahoo = MockServer::start().await;
    let config_path = test_utils::write_config(dir.path(), &status_invest.uri(), &yahoo.uri());

    run(
        AppCommand::Account(AccountCommand::Add {
            name: "Checking".to_string(),
            kind: "checking".to_string(),
            color: None,
        }),
        &config_path,
    )
    .await;
    run(
        AppCommand::Category(CategoryCommand::Add {
            name: "Pets".to_string(),
            kind: TransactionType::Expense,
            color: None,
            icon: Some("🐶".to_string()),
        }),
        &config_path,
    )
    .await;
    let date = chrono::NaiveDate::from_ymd_opt(2025, 3, 4);
    for (amount, category) in [(dec!(80), "Pets"), (dec!(20.5), "Food")] {
        run(
            AppCommand::Tx(TxCommand::Add(TxFields {
                account: 1,
                kind: TransactionType::Expense,
                amount,
                category: Some(category.to_string()),
                description: None,
                date,
            })),
            &config_path,
        )
        .await;
    }

    let period = PeriodArgs {
        from: chrono::NaiveDate::from_ymd_opt(2025, 3, 1),
        to: chrono::NaiveDate::from_ymd_opt(2025, 3, 31),
    };
    for report in [
        StatsCommand::Period {
            from: chrono::NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            to: chrono::NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
        },
        StatsCommand::Compare,
        StatsCommand::Top {
            limit: 5,
            period: period.clone(),
        },
        StatsCommand::ByCategory { period },
        StatsCommand::History { months: 3 },
    ] {
        run(AppCommand::Tx(TxCommand::Stats(report)), &config_path).await;
    }
    run(AppCommand::Category(CategoryCommand::List), &config_path).await;

    let app = test_utils::app(&config_path);
    let by_category = app.ledger.expenses_by_category(None).unwrap();
    assert_eq!(by_category[0].name, "Pets");
    assert_eq!(by_category[0].total, dec!(80));

    let duplicate = moneta::run_command(
        AppCommand::Category(CategoryCommand::Add {
            name: "Pets".to_string(),
            kind: TransactionType::Expense,
            color: None,
            icon: None,
        }),
        Some(config_path.to_str().unwrap()),
    )
    .await;
    assert!(duplicate.is_err());
}
