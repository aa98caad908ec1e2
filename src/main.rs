fn main() {
    bhasha_lib::run()
}
