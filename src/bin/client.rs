use clap::{Args, Parser, Subcommand};
use reqwest::{Client, StatusCode};

#[derive(Parser, Debug)]
#[command(name = "comanda")]
#[command(about = "client cli used by restaurant staffs to drive the bill lifecycle", version, long_about = None)]
struct Cli {
    #[arg(long, help = "Staff api token")]
    token: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser, Debug)]
enum Commands {
    /// bill level ops
    #[command(arg_required_else_help = true)]
    Bill(BillArgs),
    /// order item level ops
    #[command(arg_required_else_help = true)]
    Items(ItemsArgs),
}

#[derive(Debug, Args)]
struct BillArgs {
    #[command(subcommand)]
    command: BillCmds,
}

#[derive(Debug, Subcommand)]
enum BillCmds {
    /// open a confirmed bill on a table
    #[command(arg_required_else_help = true)]
    Open {
        #[arg(long, help = "Table id to seat", value_name = "TABLE_ID")]
        table: String,
    },
    /// a counter sale, settled immediately
    #[command(arg_required_else_help = true)]
    Instant {
        #[arg(long, help = "Customer name printed on the order")]
        customer: String,
        #[arg(long, help = "Menu items to sell.", value_name = "MENU_ITEM_IDs", num_args = 1..)]
        items: Vec<String>,
    },
    #[command(arg_required_else_help = true)]
    Confirm { id: String },
    #[command(arg_required_else_help = true)]
    Close { id: String },
    #[command(arg_required_else_help = true)]
    Decline { id: String },
}

#[derive(Debug, Args)]
struct ItemsArgs {
    #[arg(short = 'b', help = "Bill id to operate", value_name = "BILL_ID")]
    bid: String,
    #[command(subcommand)]
    command: ItemCmds,
}

#[derive(Debug, Subcommand)]
enum ItemCmds {
    #[command(arg_required_else_help = true)]
    Confirm {
        #[arg(long, help = "Order item ids to confirm.", value_name = "ORDER_ITEM_IDs", num_args = 1..)]
        items: Vec<String>,
    },
    #[command(arg_required_else_help = true)]
    Decline {
        #[arg(long, help = "Order item ids to decline.", value_name = "ORDER_ITEM_IDs", num_args = 1..)]
        items: Vec<String>,
    },
    #[command(arg_required_else_help = true)]
    Remove {
        #[arg(long, help = "Order item ids to remove.", value_name = "ORDER_ITEM_IDs", num_args = 1..)]
        items: Vec<String>,
    },
}

const HOST: &str = "http://localhost:8080";

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = Cli::parse();
    let token = args.token;

    match args.command {
        Commands::Bill(bill) => match bill.command {
            BillCmds::Open { table } => {
                println!("opening a confirmed bill on table={}", table);
                let res = Client::new()
                    .post(format!("{}/v1/bills/new", HOST))
                    .bearer_auth(&token)
                    .json(&serde_json::json!({ "tableID": table }))
                    .send()
                    .await?;
                report("open", res).await;
            }
            BillCmds::Instant { customer, items } => {
                println!("selling {} items over the counter", items.len());
                let res = Client::new()
                    .post(format!("{}/v1/bills/instant", HOST))
                    .bearer_auth(&token)
                    .json(&serde_json::json!({
                        "customerName": customer,
                        "menuItemIDs": items,
                    }))
                    .send()
                    .await?;
                report("instant sale", res).await;
            }
            BillCmds::Confirm { id } => transition(&token, &id, "confirm").await?,
            BillCmds::Close { id } => transition(&token, &id, "close").await?,
            BillCmds::Decline { id } => transition(&token, &id, "decline").await?,
        },
        Commands::Items(items_args) => {
            let bill_id = items_args.bid;
            let (action, items) = match items_args.command {
                ItemCmds::Confirm { items } => ("confirm", items),
                ItemCmds::Decline { items } => ("decline", items),
                ItemCmds::Remove { items } => ("remove", items),
            };
            println!("applying {} to {} items of bill={}", action, items.len(), bill_id);
            let res = Client::new()
                .patch(format!("{}/v1/bills/{}/{}/items", HOST, bill_id, action))
                .bearer_auth(&token)
                .json(&items)
                .send()
                .await?;
            report(action, res).await;
        }
    };
    Ok(())
}

async fn transition(token: &str, bill_id: &str, action: &str) -> Result<(), anyhow::Error> {
    println!("applying {} to bill={}", action, bill_id);
    let res = Client::new()
        .patch(format!("{}/v1/bills/{}/{}", HOST, bill_id, action))
        .bearer_auth(token)
        .send()
        .await?;
    report(action, res).await;
    Ok(())
}

async fn report(action: &str, res: reqwest::Response) {
    match res.status() {
        StatusCode::OK => {
            let body = res.text().await.unwrap_or_default();
            println!("{} succeeded, bill={}", action, body);
        }
        StatusCode::CONFLICT | StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND => {
            let body = res.text().await.unwrap_or_default();
            println!("{} rejected, {}", action, body);
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            println!("you are not allowed to {}, check your token", action);
        }
        unexpected => {
            println!("got unexpected status code, {}", unexpected);
        }
    }
}
