//! Installs the app into a portal (or reuses a stored install) and lists a few contacts.
//!
//! Reads `HUBSPOT_CLIENT_ID`, `HUBSPOT_CLIENT_SECRET`, and `HUBSPOT_REDIRECT_URI`. Run once
//! without arguments to print the authorize URL, then pass the `code` from the redirect:
//!
//! ```sh
//! cargo run --example portal_contacts
//! cargo run --example portal_contacts -- <code>
//! cargo run --example portal_contacts -- --portal <hub_id>
//! ```

// std
use std::{env, sync::Arc};
// crates.io
use color_eyre::{Result, eyre::eyre};
use serde_json::Value;
// self
use portal_broker::{
	auth::AccountId,
	config::ClientConfig,
	flows::Broker,
	provider::ProviderDescriptor,
	store::{FileStore, TokenStore},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let client = ClientConfig::from_env()?;
	let store: Arc<dyn TokenStore> = Arc::new(FileStore::open("target/portal-broker/tokens.json")?);
	let broker = Broker::new(store, ProviderDescriptor::hubspot()?, client)?;
	let args: Vec<String> = env::args().skip(1).collect();
	let account = match args.as_slice() {
		[] => {
			let session = broker.start_authorization();

			println!("Send the installing user to {}.", session.authorize_url);
			println!("Expect `state={}` on the redirect.", session.state);

			return Ok(());
		},
		[flag, portal] if flag == "--portal" => portal.parse::<AccountId>()?,
		[code] => {
			let record = broker.complete_authorization(code).await?;

			println!("Installed into portal {} with scopes `{}`.", record.account, record.scopes);

			record.account
		},
		_ => return Err(eyre!("Usage: portal_contacts [<code> | --portal <hub_id>].")),
	};
	let contacts: Value =
		broker.get_json(account, "/crm/v3/objects/contacts?limit=5&properties=email").await?;

	for contact in contacts["results"].as_array().into_iter().flatten() {
		println!("{} {}", contact["id"], contact["properties"]["email"]);
	}

	Ok(())
}
