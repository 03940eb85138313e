use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use client_manager::{Client, ClientRepository, ClientUpdate, DeleteOutcome, UpdateOutcome, config, connect};

/// Manage clients and their phone numbers
#[derive(Parser, Debug)]
#[command(name = "client-manager")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the tables if they do not exist
    Init,
    /// Add a new client
    Add {
        first_name: String,
        last_name: String,
        email: String,
    },
    /// Add a phone number to a client
    AddPhone { client_id: i32, number: String },
    /// Change some fields of a client
    Update {
        client_id: i32,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    /// Remove a phone number
    DeletePhone { phone_id: i32 },
    /// Remove a client together with their phones
    Delete { client_id: i32 },
    /// Search by name, email or phone number
    Find { term: String },
    /// Show one client
    Show { client_id: i32 },
    /// List all clients
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "client_manager=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = config::init()?;

    let mut conn = connect(&config).await?;
    let mut repo = ClientRepository::new(&mut conn);

    match cli.command {
        Command::Init => {
            repo.initialize_schema().await?;
            println!("Tables are ready");
        }
        Command::Add { first_name, last_name, email } => {
            let id = repo.add_client(&first_name, &last_name, &email).await?;
            println!("Client added with ID {id}");
        }
        Command::AddPhone { client_id, number } => {
            let phone_id = repo.add_phone(client_id, &number).await?;
            println!("Phone number added with ID {phone_id}");
        }
        Command::Update { client_id, first_name, last_name, email } => {
            let update = ClientUpdate::from_parts(first_name, last_name, email);
            match repo.update_client(client_id, &update).await? {
                UpdateOutcome::Updated => println!("Data updated"),
                UpdateOutcome::Unchanged => println!("Data is the same"),
            }
        }
        Command::DeletePhone { phone_id } => match repo.delete_phone(phone_id).await? {
            DeleteOutcome::Deleted => println!("Phone removed"),
            DeleteOutcome::NotFound => println!("Phone {phone_id} does not exist"),
        },
        Command::Delete { client_id } => {
            repo.delete_client(client_id).await?;
            println!("Client and their phones were removed");
        }
        Command::Find { term } => {
            let clients = repo.find_clients(&term).await?;
            if clients.is_empty() {
                println!("No clients match '{term}'");
            }
            clients.iter().for_each(print_client);
        }
        Command::Show { client_id } => match repo.get_client_by_id(client_id).await? {
            Some(client) => print_client(&client),
            None => println!("Client with ID {client_id} does not exist"),
        },
        Command::List => {
            repo.get_all_clients().await?.iter().for_each(print_client);
        }
    }

    Ok(())
}

fn print_client(client: &Client) {
    println!("ID: {}", client.id);
    println!("Name: {} {}", client.first_name, client.last_name);
    println!("Email: {}", client.email);
    if let Some(created_at) = client.created_at {
        println!("Created: {}", created_at.format("%Y-%m-%d %H:%M:%S"));
    }
    if client.phones.is_empty() {
        println!("Phones: none");
    } else {
        println!("Phones:");
        for phone in &client.phones {
            println!("  [{}] {}", phone.id, phone.number);
        }
    }
    println!("-------------------");
}
