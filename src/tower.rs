pub mod tower;

#[cfg(test)]
mod tests {
    mod lifecycle;
    mod proptests;
    mod radar;
    mod runway;
    mod utils;
}
