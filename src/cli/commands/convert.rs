//! Currency conversion command.

use console::style;

use crate::currency::CurrencyTable;

pub async fn cmd_convert(amount: f64, from: &str, to: &str, offline: bool) -> anyhow::Result<()> {
    let from = from.trim().to_uppercase();
    let to = to.trim().to_uppercase();

    let table = if offline {
        CurrencyTable::fallback()
    } else {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        CurrencyTable::fetch(&client, "USD").await
    };

    let converted = table.convert(amount, &from, &to);
    println!(
        "{} {:.2} {} = {:.2} {}",
        style("→").cyan(),
        amount,
        from,
        converted,
        to
    );
    Ok(())
}
