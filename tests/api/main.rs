mod deliveries;
mod health_check;
mod helpers;
mod preferences;
mod restock;
