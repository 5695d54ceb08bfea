use actix_cors::Cors;
use actix_web::{get, post, put, web, App, HttpRequest, HttpResponse, HttpServer};
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::{bson::doc, Client, Collection};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{error, info};
use uuid::Uuid;

mod auth;
mod balance;
mod config;
mod error;
mod schemas;
mod settlement;

use crate::auth::check_authorization_level;
use crate::balance::{compute_balances, validate_expense, validate_payment};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::schemas::{Category, Expense, Group, Member, MemberId, Payment, Role, Split};
use crate::settlement::settlement_plan;

#[derive(Deserialize)]
struct NewGroupJson {
    name: String,
    currency: String,
}

#[derive(Deserialize)]
struct NewMemberJson {
    id: MemberId,
    name: String,
    role: Role,
}

#[derive(Deserialize)]
struct NewExpenseJson {
    description: String,
    amount: Decimal,
    category: Category,
    payer: MemberId,
    splits: Vec<Split>,
}

#[derive(Deserialize)]
struct NewPaymentJson {
    payer: MemberId,
    payee: MemberId,
    amount: Decimal,
}

fn groups(client: &Client, config: &Config) -> Collection<Group> {
    client.database(&config.database).collection("groups")
}

fn authorized(request: &HttpRequest, config: &Config) -> bool {
    check_authorization_level(request, &config.service_token, &config.auth_secret).is_some()
}

fn member_ids(group: &Group) -> Vec<MemberId> {
    group.members.iter().map(|member| member.id.clone()).collect()
}

fn error_response(err: Error) -> HttpResponse {
    if err.is_validation() {
        HttpResponse::BadRequest().body(err.to_string())
    } else {
        error!("{err}");
        HttpResponse::InternalServerError().body(err.to_string())
    }
}

/// Cached member balances are never patched in place; every mutation ends
/// with a full recomputation from the stored records.
async fn refresh_cached_balances(collection: &Collection<Group>, id: &str) -> Result<()> {
    let group = collection
        .find_one(doc! { "id": id }, None)
        .await?
        .ok_or_else(|| Error::Storage(format!("group {id} disappeared during refresh")))?;
    let members = member_ids(&group);
    let balances = compute_balances(&members, &group.expenses, &group.payments)?;
    let members: Vec<Member> = group
        .members
        .into_iter()
        .map(|mut member| {
            member.balance = balances.get(&member.id).copied().unwrap_or(Decimal::ZERO);
            member
        })
        .collect();
    let members = bson::to_bson(&members)?;
    collection
        .update_one(doc! { "id": id }, doc! { "$set": { "members": members } }, None)
        .await?;
    Ok(())
}

#[put("/groups/{id}")]
async fn add_group(
    client: web::Data<Client>,
    config: web::Data<Config>,
    request: HttpRequest,
    id: web::Path<String>,
    json: web::Json<NewGroupJson>,
) -> HttpResponse {
    if !authorized(&request, &config) {
        return HttpResponse::Unauthorized().body("invalid authorization");
    }
    let json = json.into_inner();
    let group = Group {
        id: id.into_inner(),
        name: json.name,
        currency: json.currency,
        members: vec![],
        expenses: vec![],
        payments: vec![],
    };
    match groups(&client, &config).insert_one(&group, None).await {
        Ok(_) => {
            info!(group = %group.id, "group created");
            HttpResponse::Ok().body("Group added")
        }
        Err(err) => HttpResponse::InternalServerError().body(err.to_string()),
    }
}

#[get("/groups")]
async fn list_groups(client: web::Data<Client>, config: web::Data<Config>) -> HttpResponse {
    let cursor = match groups(&client, &config).find(None, None).await {
        Ok(cursor) => cursor,
        Err(err) => return HttpResponse::InternalServerError().body(err.to_string()),
    };
    match cursor.try_collect::<Vec<Group>>().await {
        Ok(all) => HttpResponse::Ok().json(all),
        Err(err) => HttpResponse::InternalServerError().body(err.to_string()),
    }
}

#[get("/groups/{id}")]
async fn get_group(
    client: web::Data<Client>,
    config: web::Data<Config>,
    id: web::Path<String>,
) -> HttpResponse {
    match groups(&client, &config)
        .find_one(doc! { "id": id.into_inner() }, None)
        .await
    {
        Ok(Some(group)) => HttpResponse::Ok().json(group),
        Ok(None) => HttpResponse::NotFound().body("Couldn't find the desired group"),
        Err(err) => HttpResponse::InternalServerError().body(err.to_string()),
    }
}

#[post("/groups/{id}/members")]
async fn add_member(
    client: web::Data<Client>,
    config: web::Data<Config>,
    request: HttpRequest,
    id: web::Path<String>,
    json: web::Json<NewMemberJson>,
) -> HttpResponse {
    if !authorized(&request, &config) {
        return HttpResponse::Unauthorized().body("invalid authorization");
    }
    let id = id.into_inner();
    let collection = groups(&client, &config);
    let group = match collection.find_one(doc! { "id": id.as_str() }, None).await {
        Ok(Some(group)) => group,
        Ok(None) => return HttpResponse::NotFound().body("Couldn't find the desired group"),
        Err(err) => return HttpResponse::InternalServerError().body(err.to_string()),
    };
    let json = json.into_inner();
    if group.members.iter().any(|member| member.id == json.id) {
        return error_response(Error::DuplicateMember(json.id));
    }
    let member = Member {
        id: json.id,
        name: json.name,
        role: json.role,
        balance: Decimal::ZERO,
    };
    let member = match bson::to_bson(&member) {
        Ok(member) => member,
        Err(err) => return HttpResponse::InternalServerError().body(err.to_string()),
    };
    match collection
        .update_one(
            doc! { "id": id.as_str() },
            doc! { "$push": { "members": member } },
            None,
        )
        .await
    {
        Ok(_) => HttpResponse::Ok().body("Member added"),
        Err(err) => HttpResponse::InternalServerError().body(err.to_string()),
    }
}

#[post("/groups/{id}/expenses")]
async fn add_expense(
    client: web::Data<Client>,
    config: web::Data<Config>,
    request: HttpRequest,
    id: web::Path<String>,
    json: web::Json<NewExpenseJson>,
) -> HttpResponse {
    if !authorized(&request, &config) {
        return HttpResponse::Unauthorized().body("invalid authorization");
    }
    let id = id.into_inner();
    let collection = groups(&client, &config);
    let group = match collection.find_one(doc! { "id": id.as_str() }, None).await {
        Ok(Some(group)) => group,
        Ok(None) => return HttpResponse::NotFound().body("Couldn't find the desired group"),
        Err(err) => return HttpResponse::InternalServerError().body(err.to_string()),
    };
    let json = json.into_inner();
    let expense = Expense {
        id: Uuid::new_v4().to_string(),
        description: json.description,
        amount: json.amount,
        category: json.category,
        payer: json.payer,
        splits: json.splits,
        created_at: Utc::now(),
    };
    // Malformed expenses are rejected here, before they reach storage.
    if let Err(err) = validate_expense(&expense, &member_ids(&group)) {
        return error_response(err);
    }
    let expense_bson = match bson::to_bson(&expense) {
        Ok(expense_bson) => expense_bson,
        Err(err) => return HttpResponse::InternalServerError().body(err.to_string()),
    };
    if let Err(err) = collection
        .update_one(
            doc! { "id": id.as_str() },
            doc! { "$push": { "expenses": expense_bson } },
            None,
        )
        .await
    {
        return HttpResponse::InternalServerError().body(err.to_string());
    }
    if let Err(err) = refresh_cached_balances(&collection, &id).await {
        return error_response(err);
    }
    info!(group = %id, expense = %expense.id, "expense recorded");
    HttpResponse::Ok().json(expense)
}

#[post("/groups/{id}/payments")]
async fn add_payment(
    client: web::Data<Client>,
    config: web::Data<Config>,
    request: HttpRequest,
    id: web::Path<String>,
    json: web::Json<NewPaymentJson>,
) -> HttpResponse {
    if !authorized(&request, &config) {
        return HttpResponse::Unauthorized().body("invalid authorization");
    }
    let id = id.into_inner();
    let collection = groups(&client, &config);
    let group = match collection.find_one(doc! { "id": id.as_str() }, None).await {
        Ok(Some(group)) => group,
        Ok(None) => return HttpResponse::NotFound().body("Couldn't find the desired group"),
        Err(err) => return HttpResponse::InternalServerError().body(err.to_string()),
    };
    let json = json.into_inner();
    let payment = Payment {
        id: Uuid::new_v4().to_string(),
        payer: json.payer,
        payee: json.payee,
        amount: json.amount,
        created_at: Utc::now(),
    };
    if let Err(err) = validate_payment(&payment, &member_ids(&group)) {
        return error_response(err);
    }
    let payment_bson = match bson::to_bson(&payment) {
        Ok(payment_bson) => payment_bson,
        Err(err) => return HttpResponse::InternalServerError().body(err.to_string()),
    };
    if let Err(err) = collection
        .update_one(
            doc! { "id": id.as_str() },
            doc! { "$push": { "payments": payment_bson } },
            None,
        )
        .await
    {
        return HttpResponse::InternalServerError().body(err.to_string());
    }
    if let Err(err) = refresh_cached_balances(&collection, &id).await {
        return error_response(err);
    }
    info!(group = %id, payment = %payment.id, "payment recorded");
    HttpResponse::Ok().json(payment)
}

#[get("/groups/{id}/balance")]
async fn get_balance(
    client: web::Data<Client>,
    config: web::Data<Config>,
    id: web::Path<String>,
) -> HttpResponse {
    let group = match groups(&client, &config)
        .find_one(doc! { "id": id.into_inner() }, None)
        .await
    {
        Ok(Some(group)) => group,
        Ok(None) => return HttpResponse::NotFound().body("Couldn't find the desired group"),
        Err(err) => return HttpResponse::InternalServerError().body(err.to_string()),
    };
    match compute_balances(&member_ids(&group), &group.expenses, &group.payments) {
        Ok(balances) => HttpResponse::Ok().json(balances),
        Err(err) => error_response(err),
    }
}

#[get("/groups/{id}/settlement")]
async fn get_settlement(
    client: web::Data<Client>,
    config: web::Data<Config>,
    id: web::Path<String>,
) -> HttpResponse {
    let id = id.into_inner();
    let group = match groups(&client, &config)
        .find_one(doc! { "id": id.as_str() }, None)
        .await
    {
        Ok(Some(group)) => group,
        Ok(None) => return HttpResponse::NotFound().body("Couldn't find the desired group"),
        Err(err) => return HttpResponse::InternalServerError().body(err.to_string()),
    };
    let members = member_ids(&group);
    let balances = match compute_balances(&members, &group.expenses, &group.payments) {
        Ok(balances) => balances,
        Err(err) => return error_response(err),
    };
    match settlement_plan(&balances, &members) {
        Ok(plan) => HttpResponse::Ok().json(plan),
        Err(err) => {
            error!(group = %id, "{err}");
            HttpResponse::InternalServerError().body("unable to compute settlement")
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().expect("incomplete environment configuration");
    info!("connecting to MongoDB");
    let client = Client::with_uri_str(&config.mongodb_uri)
        .await
        .expect("failed to connect");
    info!("connected");

    let bind_addr = config.bind_addr.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .app_data(web::Data::new(client.clone()))
            .app_data(web::Data::new(config.clone()))
            .service(add_group)
            .service(list_groups)
            .service(get_group)
            .service(add_member)
            .service(add_expense)
            .service(add_payment)
            .service(get_balance)
            .service(get_settlement)
    })
    .bind(bind_addr)?
    .run()
    .await
}
