fn main() {
    println!("To migrate the rooms, please run the following via Firebase CLI in the Future:");
    println!(
        "Or simply clear the 'rooms' collection in your Firebase Console and restart the app."
    );
}
